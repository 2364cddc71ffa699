//! See [RFC 8555 §6.2](https://datatracker.ietf.org/doc/html/rfc8555#section-6.2).

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    key::{AcmeKey, Jwk},
    util::base64url,
};

/// JWT Protected Header scheme as defined in [RFC 8555 §6.2].
///
/// > For newAccount requests, and for revokeCert requests authenticated by a certificate key,
/// there MUST be a "jwk" field. This field MUST contain the public key corresponding to the
/// private key used to sign the JWS.
/// >
/// > For all other requests, the request is signed using an existing account, and there MUST be a
/// "kid" field. This field MUST contain the account URL received by POSTing to the newAccount
/// resource.
///
/// v1 CAs accept the `jwk` form on every request.
///
/// [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsProtectedHeader {
    /// Algorithm, `RS256` or `ES256` depending on the account key.
    pub alg: String,

    /// Anti-replay nonce, see [RFC 8555 §6.5].
    ///
    /// [RFC 8555 §6.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.5
    pub nonce: String,

    /// Target URL of the request, see [RFC 8555 §6.4].
    ///
    /// [RFC 8555 §6.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.4
    pub url: String,

    /// JSON Web Key.
    ///
    /// Mutually exclusive with `kid` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,

    /// Key ID.
    ///
    /// Mutually exclusive with `jwk` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwsProtectedHeader {
    /// Header embedding the public key when `kid` is `None`, referencing the account otherwise.
    pub(crate) fn new(key: &AcmeKey, url: &str, nonce: String, kid: Option<&str>) -> Self {
        JwsProtectedHeader {
            alg: key.alg().to_owned(),
            nonce,
            url: url.to_owned(),
            jwk: kid.is_none().then(|| key.jwk().clone()),
            kid: kid.map(ToOwned::to_owned),
        }
    }
}

/// <https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedJsonJws {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

impl FlattenedJsonJws {
    /// Decodes the protected header, mostly useful to inspect what was sent.
    pub fn protected_header(&self) -> Option<JwsProtectedHeader> {
        let json = BASE64_URL_SAFE_NO_PAD.decode(&self.protected).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// The bytes the signature covers.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.protected, self.payload)
    }
}

/// Construct JWS with protected header according to [RFC 7515 §5.1].
///
/// A JSON string `""` payload is sent as the empty payload of a POST-as-GET.
///
/// [RFC 7515 §5.1]: https://datatracker.ietf.org/doc/html/rfc7515#section-5.1
pub(crate) fn jws_with(
    protected: &JwsProtectedHeader,
    key: &AcmeKey,
    payload: &serde_json::Value,
) -> Result<FlattenedJsonJws> {
    let header = {
        let pro_json = serde_json::to_string(protected)
            .map_err(|err| Error::SigningFailure(format!("protected header: {err}")))?;
        base64url(&pro_json)
    };

    let payload = match payload.as_str() {
        Some("") => String::new(),
        _ => base64url(&payload.to_string()),
    };

    let to_sign = format!("{header}.{payload}");
    let signature = base64url(&key.sign(to_sign.as_bytes())?);

    Ok(FlattenedJsonJws {
        protected: header,
        payload,
        signature,
    })
}
