use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    client::{Client, ClientConfig},
    error::Result,
    key::AcmeKey,
    store::KeyStore,
};

/// Per-hostname cache of [`Client`]s.
///
/// The first request for a hostname builds its client, later requests get the same instance
/// back so the directory, account URL and nonce pool are shared.
#[derive(Debug)]
pub struct ClientRegistry {
    config: ClientConfig,
    http: reqwest::Client,
    clients: Mutex<HashMap<String, Arc<Client>>>,
}

impl ClientRegistry {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self::with_http_client(config, http))
    }

    /// Registry whose clients send requests through `http`.
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        ClientRegistry {
            config,
            http,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Client for `hostname`, signing with the private JWK in `private_key_jwk`.
    ///
    /// The key is only parsed when the hostname has no client yet; an existing client keeps the
    /// key it was built with.
    pub fn client(&self, hostname: &str, private_key_jwk: &str) -> Result<Arc<Client>> {
        if let Some(client) = self.get(hostname) {
            return Ok(client);
        }

        let key = AcmeKey::from_jwk_json(private_key_jwk)?;
        Ok(self.insert(hostname, key, false))
    }

    /// Client for `hostname` signing with the anonymous account key kept in `store`.
    ///
    /// The client registers a new account on first use.
    pub fn anonymous_client(&self, hostname: &str, store: &dyn KeyStore) -> Arc<Client> {
        if let Some(client) = self.get(hostname) {
            return client;
        }

        let key = AcmeKey::load_or_generate(store);
        self.insert(hostname, key, true)
    }

    pub fn get(&self, hostname: &str) -> Option<Arc<Client>> {
        self.clients.lock().get(hostname).cloned()
    }

    /// Forgets the client for `hostname`, so the next request starts from a fresh directory.
    pub fn remove(&self, hostname: &str) -> Option<Arc<Client>> {
        self.clients.lock().remove(hostname)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, hostname: &str, key: AcmeKey, register_new: bool) -> Arc<Client> {
        let dialect = self.config.dialect_for(hostname);
        log::debug!("New {dialect} client for {hostname}");

        let mut client = Client::new(
            hostname,
            key,
            dialect,
            self.config.clone(),
            self.http.clone(),
        );
        if register_new {
            client = client.registering_new_account();
        }

        // a concurrent caller may have won the race, theirs is kept
        Arc::clone(
            self.clients
                .lock()
                .entry(hostname.to_owned())
                .or_insert_with(|| Arc::new(client)),
        )
    }
}
