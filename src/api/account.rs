use serde::{Deserialize, Serialize};

/// An ACME account resource.
///
/// Used both as the `newAccount` request payload and as the typed view of the CA's reply.
///
/// See [RFC 8555 §7.1.2].
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "valid",
///   "contact": [
///     "mailto:cert-admin@example.com"
///   ],
///   "termsOfServiceAgreed": true,
///   "orders": "https://example.com/acme/acct/evOfKhNU60wg/orders"
/// }
/// ```
///
/// [RFC 8555 §7.1.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service_agreed: Option<bool>,

    /// When true the CA must not create an account, only look up the one bound to the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_return_existing: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

impl Account {
    /// Payload for a `newAccount` call.
    pub(crate) fn lookup_or_register(register_new: bool) -> Self {
        Account {
            terms_of_service_agreed: Some(true),
            only_return_existing: (!register_new).then_some(true),
            ..Default::default()
        }
    }

    pub fn is_status_valid(&self) -> bool {
        self.status.as_deref() == Some("valid")
    }
}
