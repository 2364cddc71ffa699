use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    api::{self, Endpoint},
    dialect::{Dialect, NonceSource},
    error::{Error, Result},
    jws::{jws_with, FlattenedJsonJws, JwsProtectedHeader},
    key::{AcmeKey, Jwk},
    nonce::NoncePool,
    req::{req_get, req_handle_error, req_head, req_header, req_post},
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every client of a [`ClientRegistry`](crate::ClientRegistry).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Talk `http://` instead of `https://` to the CA. Only sensible for local test CAs.
    pub plain_http: bool,

    /// Path of the directory resource on the CA host.
    pub directory_path: String,

    /// Delay between two polls of a challenge that is still pending or processing.
    pub poll_interval: Duration,

    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,

    pub user_agent: String,

    /// Dialect to use regardless of hostname, for CAs that do not follow the `-v02` naming.
    pub dialect: Option<Dialect>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            plain_http: false,
            directory_path: "/directory".to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
            dialect: None,
        }
    }
}

impl ClientConfig {
    pub fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    pub fn with_directory_path(mut self, path: impl Into<String>) -> Self {
        self.directory_path = path.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Dialect for `hostname`: the configured override or the hostname convention.
    pub fn dialect_for(&self, hostname: &str) -> Dialect {
        self.dialect
            .unwrap_or_else(|| Dialect::for_hostname(hostname))
    }

    /// Builds the HTTP client all CA requests go through.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(Error::HttpClient)
    }
}

/// Response of the CA to a request, with the body kept as opaque JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct AcmeResource {
    /// URL the request was sent to.
    pub url: String,

    /// HTTP status code.
    pub status: u16,

    /// `Location` header, the URL of a created resource.
    pub location: Option<String>,

    /// JSON body, `Null` when empty and a JSON string when the body is not JSON.
    pub body: serde_json::Value,
}

impl AcmeResource {
    pub(crate) async fn from_response(url: &str, res: reqwest::Response) -> Result<Self> {
        let status = res.status().as_u16();
        let location = req_header(&res, "location");
        let text = res.text().await.map_err(|err| Error::transport(url, err))?;

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|err| {
                log::debug!("Non-JSON body from {url}: {err}");
                serde_json::Value::String(text)
            })
        };

        Ok(AcmeResource {
            url: url.to_owned(),
            status,
            location,
            body,
        })
    }

    /// The resource's `status` member, if it has a string one.
    pub fn status_field(&self) -> Option<&str> {
        self.body.get("status").and_then(|status| status.as_str())
    }

    /// Deserializes the body into one of the typed [`api`] views.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|source| Error::Json {
            url: self.url.clone(),
            source,
        })
    }
}

/// ACME client bound to one CA host and one account key.
///
/// Holds the cached directory, the account URL and the nonce pool. State is guarded for memory
/// safety only; operations on one client should be serialized by the caller, use separate
/// clients for concurrent work against the same CA.
pub struct Client {
    hostname: String,
    dialect: Dialect,
    config: ClientConfig,
    http: reqwest::Client,
    key: AcmeKey,
    register_new: bool,
    nonce_pool: NoncePool,
    pub(crate) directory: Mutex<Option<Arc<api::Directory>>>,
    pub(crate) account_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("hostname", &self.hostname)
            .field("dialect", &self.dialect)
            .field("key", &self.key)
            .field("account_id", &*self.account_id.lock())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(
        hostname: &str,
        key: AcmeKey,
        dialect: Dialect,
        config: ClientConfig,
        http: reqwest::Client,
    ) -> Self {
        Client {
            hostname: hostname.to_owned(),
            dialect,
            config,
            http,
            key,
            register_new: false,
            nonce_pool: NoncePool::new(),
            directory: Mutex::new(None),
            account_id: Mutex::new(None),
        }
    }

    /// Makes signed operations register a new account instead of looking up an existing one.
    pub fn registering_new_account(mut self) -> Self {
        self.register_new = true;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Public JWK of the account key.
    pub fn jwk(&self) -> &Jwk {
        self.key.jwk()
    }

    pub(crate) fn key(&self) -> &AcmeKey {
        &self.key
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn nonce_pool(&self) -> &NoncePool {
        &self.nonce_pool
    }

    pub(crate) fn register_new(&self) -> bool {
        self.register_new
    }

    /// Account URL, once known.
    pub fn account_id(&self) -> Option<String> {
        self.account_id.lock().clone()
    }

    pub fn directory_url(&self) -> String {
        let scheme = if self.config.plain_http { "http" } else { "https" };
        format!("{scheme}://{}{}", self.hostname, self.config.directory_path)
    }

    /// Returns an unused nonce, refilling the pool from the CA when it is empty.
    pub(crate) async fn take_nonce(&self) -> Result<String> {
        if let Some(nonce) = self.nonce_pool.pop() {
            return Ok(nonce);
        }

        log::debug!("Request new nonce");

        let url = match self.dialect.nonce_source() {
            NonceSource::Directory => {
                self.fetch_directory().await?;
                self.directory_url()
            }

            NonceSource::NewNonce => {
                let dir = self.directory().await?;

                // the directory response may have carried one
                if let Some(nonce) = self.nonce_pool.pop() {
                    return Ok(nonce);
                }

                let url = dir.url(Endpoint::NewNonce)?;
                let res = req_head(&self.http, url).await?;
                self.nonce_pool.extract_nonce(&res);
                url.to_owned()
            }
        };

        log::trace!("Nonce pool holds {}", self.nonce_pool.len());
        self.nonce_pool.pop().ok_or(Error::MissingNonce { url })
    }

    /// Produces a flattened JWS of `payload` for `url`, consuming exactly one nonce.
    ///
    /// The header embeds the public JWK when `kid` is `None` and references the account
    /// otherwise.
    pub async fn sign(
        &self,
        url: &str,
        kid: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<FlattenedJsonJws> {
        let nonce = self.take_nonce().await?;
        let protected = JwsProtectedHeader::new(&self.key, url, nonce, kid);
        jws_with(&protected, &self.key, payload)
    }

    /// Signs and POSTs `payload`, returning the raw response.
    ///
    /// `resource` is the v1 payload tag. Nonces on the response are pooled whatever the status.
    pub(crate) async fn send_signed<T>(
        &self,
        url: &str,
        resource: &str,
        payload: &T,
        kid: Option<&str>,
    ) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        let mut payload = serde_json::to_value(payload)
            .map_err(|err| Error::SigningFailure(format!("payload: {err}")))?;
        self.dialect.tag_payload(&mut payload, resource);

        let jws = self.sign(url, kid, &payload).await?;
        let body = serde_json::to_string(&jws)
            .map_err(|err| Error::SigningFailure(format!("JWS: {err}")))?;

        log::debug!("Call endpoint: {url}");
        let res = req_post(&self.http, url, body, self.dialect.content_type()).await?;

        // Regardless of the request being a success or not, there might be a nonce in the
        // response.
        self.nonce_pool.extract_nonce(&res);

        Ok(res)
    }

    /// Signed call with the directory and, for v2, the account resolved first.
    pub(crate) async fn call<T>(&self, url: &str, resource: &str, payload: &T) -> Result<AcmeResource>
    where
        T: Serialize + ?Sized,
    {
        self.directory().await?;

        let kid = if self.dialect.requires_account() {
            Some(self.ensure_account(self.register_new()).await?)
        } else {
            None
        };
        let kid = kid.filter(|_| self.dialect.uses_key_id());

        let res = self.send_signed(url, resource, payload, kid.as_deref()).await?;
        let res = req_handle_error(url, res).await?;

        AcmeResource::from_response(url, res).await
    }

    /// Reads a resource: POST-as-GET for v2, an unauthenticated GET for v1.
    pub async fn fetch(&self, url: &str) -> Result<AcmeResource> {
        if self.dialect.polls_with_post() {
            return self.call(url, "", &api::EmptyString).await;
        }

        let res = req_get(&self.http, url).await?;
        self.nonce_pool.extract_nonce(&res);
        let res = req_handle_error(url, res).await?;

        AcmeResource::from_response(url, res).await
    }
}
