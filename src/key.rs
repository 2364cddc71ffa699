//! Account key material.
//!
//! Keys arrive as private JWK records (`kty` = `RSA` or `EC`) or PKCS#8 PEM and are turned into
//! a signing handle plus the public [`Jwk`] that goes into JWS headers and thumbprints.

use std::fmt;

use base64::prelude::*;
use p256::ecdsa::signature::Signer as _;
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use rsa::{
    pkcs1v15,
    signature::SignatureEncoding as _,
    traits::{PrivateKeyParts as _, PublicKeyParts as _},
    BigUint, RsaPrivateKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use zeroize::Zeroizing;

use crate::{
    error::{Error, Result},
    util::base64url,
};

/// Private key in JWK form, as supplied by the caller or persisted in a key store.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub kty: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .finish_non_exhaustive()
    }
}

/// Public JSON Web Key, see [RFC 7517].
///
/// Only carries the members needed for JWS header embedding and thumbprints.
///
/// [RFC 7517]: https://datatracker.ietf.org/doc/html/rfc7517
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "RSA")]
    Rsa { e: String, n: String },

    #[serde(rename = "EC")]
    Ec { crv: String, x: String, y: String },
}

impl Jwk {
    /// JWK thumbprint as defined in [RFC 7638], base64url encoded.
    ///
    /// [RFC 7638]: https://datatracker.ietf.org/doc/html/rfc7638
    pub fn thumbprint(&self) -> String {
        // serde_json maps keep keys sorted, which is the lexical order the RFC demands.
        let members = match self {
            Jwk::Rsa { e, n } => serde_json::json!({ "e": e, "kty": "RSA", "n": n }),
            Jwk::Ec { crv, x, y } => {
                serde_json::json!({ "crv": crv, "kty": "EC", "x": x, "y": y })
            }
        };

        base64url(&Sha256::digest(members.to_string()))
    }
}

#[derive(Clone)]
enum SigningKey {
    Rsa(RsaPrivateKey),
    Ec(p256::ecdsa::SigningKey),
}

/// Account key: a signing handle plus its public JWK.
#[derive(Clone)]
pub struct AcmeKey {
    signing_key: SigningKey,
    jwk: Jwk,
}

impl fmt::Debug for AcmeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcmeKey")
            .field("alg", &self.alg())
            .field("jwk", &self.jwk)
            .finish()
    }
}

impl AcmeKey {
    /// Parses a private JWK JSON document.
    pub fn from_jwk_json(json: &str) -> Result<AcmeKey> {
        let record = serde_json::from_str::<KeyRecord>(json)
            .map_err(|err| Error::UnsupportedKey(format!("not a JWK: {err}")))?;
        Self::from_record(&record)
    }

    pub fn from_record(record: &KeyRecord) -> Result<AcmeKey> {
        match record.kty.as_str() {
            "RSA" => {
                let n = biguint(&record.n, "n")?;
                let e = biguint(&record.e, "e")?;
                let d = biguint(&record.d, "d")?;

                let primes = match (&record.p, &record.q) {
                    (Some(_), Some(_)) => vec![biguint(&record.p, "p")?, biguint(&record.q, "q")?],
                    _ => Vec::new(),
                };

                let key = RsaPrivateKey::from_components(n, e, d, primes)
                    .map_err(|err| Error::UnsupportedKey(format!("RSA: {err}")))?;
                key.validate()
                    .map_err(|err| Error::UnsupportedKey(format!("RSA: {err}")))?;

                Ok(Self::from_rsa(key))
            }

            "EC" => {
                let crv = record.crv.as_deref().unwrap_or_default();
                if crv != "P-256" {
                    return Err(Error::UnsupportedAlgorithm(format!("EC curve {crv:?}")));
                }

                let d = Zeroizing::new(decode(&record.d, "d")?);
                let signing_key = p256::ecdsa::SigningKey::from_slice(&d)
                    .map_err(|err| Error::UnsupportedKey(format!("EC: {err}")))?;

                let key = Self::from_p256(signing_key);

                // a record whose public point disagrees with `d` is corrupt
                if let (Some(x), Some(y), Jwk::Ec { x: dx, y: dy, .. }) =
                    (&record.x, &record.y, &key.jwk)
                {
                    if x != dx || y != dy {
                        return Err(Error::UnsupportedKey(
                            "EC: public point does not match private scalar".to_owned(),
                        ));
                    }
                }

                Ok(key)
            }

            kty => Err(Error::UnsupportedKey(format!("key type {kty:?}"))),
        }
    }

    /// Parses a PKCS#8 PEM private key, either P-256 or RSA.
    pub fn from_pem(pem: &str) -> Result<AcmeKey> {
        if let Ok(signing_key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self::from_p256(signing_key));
        }

        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(Self::from_rsa)
            .map_err(|err| Error::UnsupportedKey(format!("PEM: {err}")))
    }

    /// Generates a fresh P-256 key.
    pub fn generate_p256() -> AcmeKey {
        let csprng = &mut rand::thread_rng();
        Self::from_p256(ecdsa::SigningKey::from(p256::SecretKey::random(csprng)))
    }

    fn from_p256(signing_key: p256::ecdsa::SigningKey) -> AcmeKey {
        let (x, y) = ec_coordinates(&signing_key);

        let jwk = Jwk::Ec {
            crv: "P-256".to_owned(),
            x,
            y,
        };

        AcmeKey {
            signing_key: SigningKey::Ec(signing_key),
            jwk,
        }
    }

    fn from_rsa(key: RsaPrivateKey) -> AcmeKey {
        let jwk = Jwk::Rsa {
            e: base64url(&key.e().to_bytes_be()),
            n: base64url(&key.n().to_bytes_be()),
        };

        AcmeKey {
            signing_key: SigningKey::Rsa(key),
            jwk,
        }
    }

    /// The private key as a JWK record, suitable for persisting.
    pub fn to_record(&self) -> KeyRecord {
        match &self.signing_key {
            SigningKey::Ec(signing_key) => {
                let (x, y) = ec_coordinates(signing_key);

                KeyRecord {
                    kty: "EC".to_owned(),
                    crv: Some("P-256".to_owned()),
                    x: Some(x),
                    y: Some(y),
                    d: Some(base64url(&signing_key.to_bytes())),
                    ..Default::default()
                }
            }

            SigningKey::Rsa(key) => {
                let mut primes = key.primes().iter().map(|p| base64url(&p.to_bytes_be()));

                KeyRecord {
                    kty: "RSA".to_owned(),
                    n: Some(base64url(&key.n().to_bytes_be())),
                    e: Some(base64url(&key.e().to_bytes_be())),
                    d: Some(base64url(&key.d().to_bytes_be())),
                    p: primes.next(),
                    q: primes.next(),
                    ..Default::default()
                }
            }
        }
    }

    /// The private key as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        let pem = match &self.signing_key {
            SigningKey::Ec(signing_key) => signing_key.to_pkcs8_pem(pkcs8::LineEnding::LF),
            SigningKey::Rsa(key) => key.to_pkcs8_pem(pkcs8::LineEnding::LF),
        };

        pem.map_err(|err| Error::UnsupportedKey(format!("PEM: {err}")))
    }

    /// JWS algorithm for this key.
    pub fn alg(&self) -> &'static str {
        match self.signing_key {
            SigningKey::Rsa(_) => "RS256",
            SigningKey::Ec(_) => "ES256",
        }
    }

    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// Signs `message` with RSASSA-PKCS1-v1_5 or ECDSA, both over SHA-256.
    ///
    /// ECDSA signatures use the fixed-size `r || s` encoding required by [RFC 7518 §3.4].
    ///
    /// [RFC 7518 §3.4]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.4
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.signing_key {
            SigningKey::Rsa(key) => {
                let signer = pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let signature = signer
                    .try_sign(message)
                    .map_err(|err| Error::SigningFailure(err.to_string()))?;
                Ok(signature.to_vec())
            }

            SigningKey::Ec(signing_key) => {
                let signature: p256::ecdsa::Signature = signing_key
                    .try_sign(message)
                    .map_err(|err| Error::SigningFailure(err.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// Key authorization for a challenge token: `token.thumbprint`.
    ///
    /// See [RFC 8555 §8.1].
    ///
    /// [RFC 8555 §8.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.1
    pub fn key_authorization(&self, token: &str) -> String {
        format!("{token}.{}", self.jwk.thumbprint())
    }

    /// `dns-01` TXT record value: base64url of the SHA-256 of the key authorization.
    pub fn dns_key_authorization(&self, token: &str) -> String {
        base64url(&Sha256::digest(self.key_authorization(token)))
    }
}

/// Base64url `x` and `y` of the uncompressed public point.
fn ec_coordinates(signing_key: &p256::ecdsa::SigningKey) -> (String, String) {
    let point = signing_key.verifying_key().to_encoded_point(false);

    // an uncompressed point always carries both coordinates
    let coordinate = |c: Option<&p256::FieldBytes>| c.map(base64url).unwrap_or_default();

    (coordinate(point.x()), coordinate(point.y()))
}

fn decode(field: &Option<String>, name: &str) -> Result<Vec<u8>> {
    let value = field
        .as_deref()
        .ok_or_else(|| Error::UnsupportedKey(format!("missing member {name:?}")))?;

    BASE64_URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|err| Error::UnsupportedKey(format!("member {name:?}: {err}")))
}

fn biguint(field: &Option<String>, name: &str) -> Result<BigUint> {
    decode(field, name).map(|bytes| BigUint::from_bytes_be(&bytes))
}
