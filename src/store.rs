//! Persistence of the anonymous account key.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::key::AcmeKey;

/// Label the anonymous account key is stored under.
pub const ACCOUNT_KEY_LABEL: &str = "acme-account-key";

/// Failure reported by a [`KeyStore`] backend.
#[derive(Debug, thiserror::Error)]
#[error("key store failure: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl std::fmt::Display) -> Self {
        StoreError(msg.to_string())
    }
}

/// Outcome of a [`KeyStore::load`].
#[derive(Debug)]
pub enum KeyLookup {
    /// The stored value, a serialized private JWK.
    Found(String),
    NotFound,
    Failed(StoreError),
}

/// Label-addressed storage for serialized private keys.
pub trait KeyStore {
    fn load(&self, label: &str) -> KeyLookup;

    fn store(&self, label: &str, value: &str) -> Result<(), StoreError>;
}

/// Process-local [`KeyStore`], mostly useful for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, label: &str) -> KeyLookup {
        match self.entries.lock().get(label) {
            Some(value) => KeyLookup::Found(value.clone()),
            None => KeyLookup::NotFound,
        }
    }

    fn store(&self, label: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(label.to_owned(), value.to_owned());
        Ok(())
    }
}

impl AcmeKey {
    /// Loads the anonymous account key from `store`, generating and persisting a P-256 key when
    /// there is none.
    ///
    /// Never fails: unreadable or unusable stored keys are replaced and a failed save only costs
    /// a new key on the next run. Both are logged as warnings.
    pub fn load_or_generate(store: &dyn KeyStore) -> AcmeKey {
        match store.load(ACCOUNT_KEY_LABEL) {
            KeyLookup::Found(json) => match AcmeKey::from_jwk_json(&json) {
                Ok(key) => return key,
                Err(err) => log::warn!("Ignoring stored account key: {err}"),
            },
            KeyLookup::NotFound => log::debug!("No stored account key, generating one"),
            KeyLookup::Failed(err) => log::warn!("Could not load account key: {err}"),
        }

        let key = AcmeKey::generate_p256();

        match serde_json::to_string(&key.to_record()) {
            Ok(json) => {
                if let Err(err) = store.store(ACCOUNT_KEY_LABEL, &json) {
                    log::warn!("Could not save account key: {err}");
                }
            }
            Err(err) => log::warn!("Could not serialize account key: {err}"),
        }

        key
    }
}
