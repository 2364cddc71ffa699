use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

impl ChallengeStatus {
    /// Parses the wire value of a challenge `status` field.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(ChallengeStatus::Pending),
            "processing" => Some(ChallengeStatus::Processing),
            "valid" => Some(ChallengeStatus::Valid),
            "invalid" => Some(ChallengeStatus::Invalid),
            _ => None,
        }
    }

    /// Returns true while the CA has not reached a verdict.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ChallengeStatus::Pending | ChallengeStatus::Processing)
    }
}

/// An ACME challenge object.
///
/// Represents a server's offer to validate a client's possession of an identifier in a specific
/// way.
///
/// See [RFC 8555 §7.1.5].
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "http-01",
///   "status": "pending",
///   "url": "https://acme-staging-v02.api.letsencrypt.org/acme/challenge/YTqpYUthlVfwBncUufE8IRA2TkzZkN4eYWWLMSRqcSs/216789597",
///   "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w"
/// }
/// ```
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Type of challenge encoded in the object.
    #[serde(rename = "type")]
    pub _type: String,

    /// URL to which a response can be posted.
    ///
    /// v1 CAs call this `uri`.
    #[serde(alias = "uri")]
    pub url: String,

    /// Status of this challenge.
    pub status: ChallengeStatus,

    /// Time at which the server validated this challenge.
    ///
    /// Uses RFC 3339 format.
    pub validated: Option<String>,

    /// Error that occurred while the server was validating the challenge, if any.
    pub error: Option<api::Problem>,

    pub token: Option<String>,
}

/// Challenge response of the v1 dialect, which carries the key authorization in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    #[serde(rename = "type")]
    pub _type: String,
    pub key_authorization: String,
}

impl ChallengeResponse {
    pub(crate) fn http_01(key_authorization: String) -> Self {
        ChallengeResponse {
            _type: "http-01".to_owned(),
            key_authorization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(ChallengeStatus::parse("pending"), Some(ChallengeStatus::Pending));
        assert_eq!(ChallengeStatus::parse("valid"), Some(ChallengeStatus::Valid));
        assert_eq!(ChallengeStatus::parse("deactivated"), None);
        assert_eq!(ChallengeStatus::parse("Pending"), None);
        assert!(ChallengeStatus::Processing.is_in_progress());
        assert!(!ChallengeStatus::Invalid.is_in_progress());
    }

    #[test]
    fn test_v1_challenge_uri() {
        let chall: Challenge = serde_json::from_str(
            r#"{"type":"http-01","status":"pending","uri":"https://ca/chall/1","token":"abc"}"#,
        )
        .unwrap();
        assert_eq!(chall.url, "https://ca/chall/1");
        assert_eq!(chall.token.as_deref(), Some("abc"));
    }
}
