use std::sync::Arc;

use crate::{
    api,
    error::{Error, Result},
    req::{req_get, req_json},
    Client,
};

impl Client {
    /// Returns the CA's directory, fetching it on first use.
    ///
    /// Once fetched the directory is kept for the lifetime of the client.
    pub async fn directory(&self) -> Result<Arc<api::Directory>> {
        let cached = self.directory.lock().clone();
        if let Some(dir) = cached {
            return Ok(dir);
        }

        self.fetch_directory().await
    }

    /// GETs the directory, offering any `Replay-Nonce` it carries to the nonce pool.
    ///
    /// The first successful fetch is cached, later fetches only refill nonces.
    pub(crate) async fn fetch_directory(&self) -> Result<Arc<api::Directory>> {
        let url = self.directory_url();
        log::debug!("Fetching directory {url}");

        let unreachable = |reason: String| Error::DirectoryUnreachable {
            url: url.clone(),
            reason,
        };

        let res = req_get(self.http(), &url)
            .await
            .map_err(|err| unreachable(err.to_string()))?;

        self.nonce_pool().extract_nonce(&res);

        if !res.status().is_success() {
            return Err(unreachable(format!("status {}", res.status())));
        }

        let api_directory = req_json::<api::Directory>(&url, res)
            .await
            .map_err(|err| unreachable(err.to_string()))?;

        let mut cached = self.directory.lock();
        let dir = cached.get_or_insert_with(|| {
            log::debug!(
                "Directory operations: {:?}",
                api_directory.operations().collect::<Vec<_>>()
            );
            Arc::new(api_directory)
        });

        Ok(Arc::clone(dir))
    }
}
