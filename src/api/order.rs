use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Order`].
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// An ACME order object.
///
/// Represents a client's request for a certificate and is used to track the progress of that order
/// through to issuance.
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "pending",
///   "expires": "2019-01-09T08:26:43.570360537Z",
///   "identifiers": [
///     {
///       "type": "dns",
///       "value": "acme-test.example.com"
///     }
///   ],
///   "authorizations": [
///     "https://example.com/acme/authz/YTqpYUthlVfwBncUufE8IRA2TkzZkN4eYWWLMSRqcSs"
///   ],
///   "finalize": "https://example.com/acme/finalize/7738992/18234324"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub status: OrderStatus,

    pub expires: Option<String>,

    pub identifiers: Vec<Identifier>,

    pub error: Option<api::Problem>,

    #[serde(default)]
    pub authorizations: Vec<String>,

    pub finalize: Option<String>,

    pub certificate: Option<String>,
}

impl Order {
    /// Returns all domains associated with this order.
    pub fn domains(&self) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(|identifier| identifier.value.as_str())
            .collect()
    }
}

/// An identifier an order or authorization is about, in practice always a DNS name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: String,
    pub value: String,
}

impl Identifier {
    pub fn dns(name: &str) -> Self {
        Identifier {
            _type: "dns".to_owned(),
            value: name.to_owned(),
        }
    }
}

/// Payload of a `newOrder` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub identifiers: Vec<Identifier>,
}

impl NewOrder {
    /// Builds a DNS order, dropping repeated names but keeping first-seen order.
    pub fn dns<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut identifiers: Vec<Identifier> = Vec::new();
        for name in names {
            if !identifiers.iter().any(|id| id.value == name) {
                identifiers.push(Identifier::dns(name));
            }
        }
        NewOrder { identifiers }
    }
}
