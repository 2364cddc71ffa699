use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Operation published in a CA [`Directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    NewNonce,
    NewAccount,
    NewOrder,
    NewAuthz,
    RevokeCert,
    KeyChange,
}

impl Endpoint {
    /// The RFC 8555 directory member name.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::NewNonce => "newNonce",
            Endpoint::NewAccount => "newAccount",
            Endpoint::NewOrder => "newOrder",
            Endpoint::NewAuthz => "newAuthz",
            Endpoint::RevokeCert => "revokeCert",
            Endpoint::KeyChange => "keyChange",
        }
    }

    /// The member name used by draft (v1) directories, which also serves as the v1 `resource`
    /// payload tag.
    pub fn legacy_name(&self) -> &'static str {
        match self {
            Endpoint::NewNonce => "new-nonce",
            Endpoint::NewAccount => "new-reg",
            Endpoint::NewOrder => "new-order",
            Endpoint::NewAuthz => "new-authz",
            Endpoint::RevokeCert => "revoke-cert",
            Endpoint::KeyChange => "key-change",
        }
    }
}

/// Directory object for ACME client self-configuration.
///
/// Kept as a map from operation name to URL, since v1 and v2 CAs publish different names.
///
/// See [RFC 8555 §7.1.1].
///
/// # Example JSON
///
/// ```json
/// {
///   "newNonce": "https://example.com/acme/new-nonce",
///   "newAccount": "https://example.com/acme/new-account",
///   "newOrder": "https://example.com/acme/new-order",
///   "revokeCert": "https://example.com/acme/revoke-cert",
///   "keyChange": "https://example.com/acme/key-change",
///   "meta": {
///     "termsOfService": "https://example.com/acme/terms/2017-5-30",
///     "website": "https://www.example.com/",
///     "caaIdentities": ["example.com"],
///     "externalAccountRequired": false
///   }
/// }
/// ```
///
/// [RFC 8555 §7.1.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DirectoryMeta>,

    #[serde(flatten)]
    entries: BTreeMap<String, serde_json::Value>,
}

impl Directory {
    /// Looks up an operation by name; non-string members (such as v1 easter eggs) are ignored.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|url| url.as_str())
    }

    /// URL of `endpoint`, trying the RFC 8555 name before the draft name.
    pub fn url(&self, endpoint: Endpoint) -> Result<&str> {
        self.get(endpoint.name())
            .or_else(|| self.get(endpoint.legacy_name()))
            .ok_or(Error::MissingDirectoryEntry(endpoint.name()))
    }

    /// All operation names with a URL value.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, url)| Some((name.as_str(), url.as_str()?)))
    }
}

/// <https://datatracker.ietf.org/doc/html/rfc8555#section-9.7.6>
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
    /// URL identifying the current terms of service.
    #[serde(skip_serializing_if = "Option::is_none", alias = "terms-of-service")]
    pub terms_of_service: Option<String>,

    /// URL locating a website providing more information about the ACME server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    /// The hostnames that the ACME server recognizes as referring to itself for the purposes of
    /// Certification Authority Authorization (CAA) record validation as defined in [RFC 6844].
    ///
    /// [RFC 6844]: https://datatracker.ietf.org/doc/html/rfc6844
    #[serde(skip_serializing_if = "Option::is_none", alias = "caa-identities")]
    pub caa_identities: Option<Vec<String>>,

    /// If true, then the CA requires that all newAccount requests include an
    /// `externalAccountBinding` field associating the new account with an external account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_account_required: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_directory() {
        let dir: Directory = serde_json::from_str(
            r#"{
                "newAccount": "https://ca/acct",
                "newNonce": "https://ca/nonce",
                "newOrder": "https://ca/order",
                "meta": { "caaIdentities": ["testdir.org"] }
            }"#,
        )
        .unwrap();

        assert_eq!(dir.url(Endpoint::NewAccount).unwrap(), "https://ca/acct");
        assert_eq!(dir.url(Endpoint::NewNonce).unwrap(), "https://ca/nonce");
        assert_eq!(
            dir.meta.unwrap().caa_identities,
            Some(vec!["testdir.org".to_owned()])
        );
    }

    #[test]
    fn test_v1_directory() {
        let dir: Directory = serde_json::from_str(
            r#"{
                "Ca3-LsaB2LY": "https://community.letsencrypt.org/t/adding-random-entries-to-the-directory/33417",
                "key-change": "https://ca/acme/key-change",
                "new-authz": "https://ca/acme/new-authz",
                "new-reg": "https://ca/acme/new-reg",
                "revoke-cert": "https://ca/acme/revoke-cert",
                "meta": { "terms-of-service": "https://ca/terms.pdf" }
            }"#,
        )
        .unwrap();

        assert_eq!(dir.url(Endpoint::NewAccount).unwrap(), "https://ca/acme/new-reg");
        assert_eq!(dir.url(Endpoint::RevokeCert).unwrap(), "https://ca/acme/revoke-cert");
        assert_eq!(
            dir.meta.as_ref().unwrap().terms_of_service.as_deref(),
            Some("https://ca/terms.pdf")
        );

        let err = dir.url(Endpoint::NewNonce).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MissingDirectoryEntry);
        assert_eq!(dir.operations().count(), 5);
    }
}
