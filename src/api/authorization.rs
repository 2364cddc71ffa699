use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Authorization`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

/// An ACME authorization object.
///
/// Represents a server's authorization for an account to represent an identifier.
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub identifier: api::Identifier,
    pub status: AuthorizationStatus,
    pub expires: Option<String>,
    pub challenges: Vec<api::Challenge>,
    pub wildcard: Option<bool>,
}

impl Authorization {
    /// Returns the challenge of the given type (`http-01`, `dns-01`, ...) if offered.
    pub fn challenge(&self, _type: &str) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == _type)
    }
}

/// Payload that asks the CA to deactivate an authorization.
///
/// See [RFC 8555 §7.5.2].
///
/// [RFC 8555 §7.5.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.5.2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deactivation {
    pub status: String,
}

impl Default for Deactivation {
    fn default() -> Self {
        Deactivation {
            status: "deactivated".to_owned(),
        }
    }
}
