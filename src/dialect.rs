//! Wire conventions of the two ACME dialects a CA may speak.

use std::fmt;

/// Marker in a CA hostname that identifies an RFC 8555 endpoint.
const V2_HOSTNAME_MARKER: &str = "-v02";

const JOSE_JSON: &str = "application/jose+json";

/// Which ACME protocol revision a CA endpoint speaks.
///
/// - `V1`: the pre-RFC draft served by the legacy Boulder front end. Signed bodies must be sent
///   without a content-type header (the front end rejects the CORS preflight it would cause),
///   every request embeds the JWK, payloads carry a `resource` member and resources are read
///   with plain GETs.
/// - `V2`: [RFC 8555]. Signed bodies are `application/jose+json`, requests after account
///   lookup are authenticated by key ID, and resources are read with POST-as-GET.
///
/// [RFC 8555]: https://datatracker.ietf.org/doc/html/rfc8555
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    V1,
    V2,
}

/// Where an empty nonce pool is refilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSource {
    /// `Replay-Nonce` of a GET to the directory.
    Directory,
    /// `Replay-Nonce` of a HEAD to the `newNonce` endpoint.
    NewNonce,
}

impl Dialect {
    /// Selects the dialect from a CA hostname.
    pub fn for_hostname(hostname: &str) -> Dialect {
        if hostname.contains(V2_HOSTNAME_MARKER) {
            Dialect::V2
        } else {
            Dialect::V1
        }
    }

    /// Content-type header for signed bodies, `None` meaning the header must be absent.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Dialect::V1 => None,
            Dialect::V2 => Some(JOSE_JSON),
        }
    }

    /// Whether requests are authenticated with `kid` once the account URL is known.
    pub fn uses_key_id(&self) -> bool {
        matches!(self, Dialect::V2)
    }

    /// Whether signed operations first need an account URL.
    pub fn requires_account(&self) -> bool {
        self.uses_key_id()
    }

    /// Whether resources are re-fetched by POST-as-GET rather than an unauthenticated GET.
    pub fn polls_with_post(&self) -> bool {
        matches!(self, Dialect::V2)
    }

    pub fn nonce_source(&self) -> NonceSource {
        match self {
            Dialect::V1 => NonceSource::Directory,
            Dialect::V2 => NonceSource::NewNonce,
        }
    }

    /// Adds the v1 `resource` member to an object payload; a no-op for v2.
    pub(crate) fn tag_payload(&self, payload: &mut serde_json::Value, resource: &str) {
        if let (Dialect::V1, Some(object)) = (self, payload.as_object_mut()) {
            object.insert("resource".to_owned(), resource.into());
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::V1 => f.write_str("ACME v1"),
            Dialect::V2 => f.write_str("ACME v2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_for_hostname() {
        assert_eq!(
            Dialect::for_hostname("acme-staging-v02.api.letsencrypt.org"),
            Dialect::V2
        );
        assert_eq!(Dialect::for_hostname("acme-v02.api.letsencrypt.org"), Dialect::V2);
        assert_eq!(Dialect::for_hostname("acme-staging.api.letsencrypt.org"), Dialect::V1);
        assert_eq!(Dialect::for_hostname("acme-v01.api.letsencrypt.org"), Dialect::V1);

        // stable across lookups
        for _ in 0..3 {
            assert_eq!(Dialect::for_hostname("ca-v02.example"), Dialect::V2);
        }
    }

    #[test]
    fn test_capabilities() {
        assert_eq!(Dialect::V1.content_type(), None);
        assert_eq!(Dialect::V2.content_type(), Some("application/jose+json"));
        assert!(!Dialect::V1.uses_key_id());
        assert!(Dialect::V2.requires_account());
        assert!(!Dialect::V1.polls_with_post());
        assert_eq!(Dialect::V1.nonce_source(), NonceSource::Directory);
        assert_eq!(Dialect::V2.nonce_source(), NonceSource::NewNonce);
    }

    #[test]
    fn test_tag_payload() {
        let mut payload = json!({ "status": "deactivated" });
        Dialect::V2.tag_payload(&mut payload, "authz");
        assert_eq!(payload, json!({ "status": "deactivated" }));

        Dialect::V1.tag_payload(&mut payload, "authz");
        assert_eq!(payload, json!({ "status": "deactivated", "resource": "authz" }));

        let mut empty = json!("");
        Dialect::V1.tag_payload(&mut empty, "authz");
        assert_eq!(empty, json!(""));
    }
}
