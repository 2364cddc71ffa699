use serde::{Deserialize, Serialize};

use crate::util::base64url;

/// Payload of a `revokeCert` request, see [RFC 8555 §7.6].
///
/// [RFC 8555 §7.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// base64url of the certificate's DER bytes (not PEM).
    pub certificate: String,

    /// RFC 5280 reason code, absent for "unspecified".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<usize>,
}

impl Revocation {
    pub fn from_der(der: &[u8], reason: Option<usize>) -> Self {
        Revocation {
            certificate: base64url(der),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_payload() {
        let revocation = Revocation::from_der(&[0x30, 0x82, 0xff], None);
        assert_eq!(
            serde_json::to_string(&revocation).unwrap(),
            r#"{"certificate":"MIL_"}"#
        );

        let revocation = Revocation::from_der(&[0x30], Some(4));
        assert_eq!(
            serde_json::to_value(&revocation).unwrap(),
            serde_json::json!({ "certificate": "MA", "reason": 4 })
        );
    }
}
