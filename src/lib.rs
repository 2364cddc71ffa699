//! Diagnosing certificate issuance against ACME (Automatic Certificate Management Environment)
//! providers such as [Let's Encrypt](https://letsencrypt.org/).
//!
//! The client speaks both the pre-RFC draft protocol ("v1") and
//! [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555) ("v2"). Every step of an issuance
//! (account lookup, order creation, challenge response and polling, authorization deactivation,
//! revocation) is exposed on its own and returns the CA's raw answer, so a diagnostic view can
//! show exactly where an issuance goes wrong.
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> acme::Result<()> {
//! use acme::{ClientConfig, ClientRegistry};
//!
//! let registry = ClientRegistry::new(ClientConfig::default())?;
//! let client = registry.client(
//!     "acme-staging-v02.api.letsencrypt.org",
//!     r#"{"kty":"EC","crv":"P-256","x":"...","y":"...","d":"..."}"#,
//! )?;
//!
//! let order = client.new_order(["example.com"]).await?;
//! println!("order {:?}: {}", order.location, order.body);
//! # Ok(())
//! # }
//! ```
//!
//! # Dialects
//!
//! The protocol revision is picked from the CA hostname: hosts containing `-v02` speak v2,
//! everything else v1. [`ClientConfig::with_dialect`] overrides the convention.
//!
//! # Rate Limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API is not being abused. It
//! might be tempting to put the poll interval really low, but balance this against the real risk
//! of having access cut off.
//!
//! ## Use Staging For Development!
//!
//! Especially take care to use the Let's Encrypt staging environment for development where the rate
//! limits are more relaxed.
//!
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acc;
mod client;
mod dialect;
mod dir;
mod error;
mod jws;
mod key;
mod nonce;
mod order;
mod registry;
mod req;
mod store;
mod util;

pub mod api;


pub use crate::{
    client::{AcmeResource, Client, ClientConfig},
    dialect::{Dialect, NonceSource},
    error::{Error, ErrorKind, Result},
    jws::{FlattenedJsonJws, JwsProtectedHeader},
    key::{AcmeKey, Jwk, KeyRecord},
    order::RevocationReason,
    registry::ClientRegistry,
    store::{KeyLookup, KeyStore, MemoryKeyStore, StoreError, ACCOUNT_KEY_LABEL},
};
