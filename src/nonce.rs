use std::collections::VecDeque;

use parking_lot::Mutex;

/// Most nonces kept at once; the oldest are dropped beyond this.
const MAX_POOLED: usize = 10;

/// How many handed-out nonces are remembered to refuse them if offered again.
const MAX_SPENT: usize = 64;

/// Stack of unused anti-replay nonces for a single client.
///
/// Nonces are single use and interchangeable, so the most recently received one is handed out
/// first. Refilling an empty pool is the client's job since the source of fresh nonces differs
/// between dialects.
#[derive(Debug, Default)]
pub(crate) struct NoncePool {
    inner: Mutex<PoolInner>,
}

#[derive(Debug, Default)]
struct PoolInner {
    stack: Vec<String>,
    spent: VecDeque<String>,
}

impl NoncePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the most recently offered nonce, if any.
    pub fn pop(&self) -> Option<String> {
        let mut inner = self.inner.lock();

        let nonce = inner.stack.pop()?;
        log::trace!("Use previous nonce");

        inner.spent.push_back(nonce.clone());
        if inner.spent.len() > MAX_SPENT {
            inner.spent.pop_front();
        }

        Some(nonce)
    }

    /// Adds a fresh nonce to the pool.
    pub fn push(&self, nonce: String) {
        let mut inner = self.inner.lock();

        if inner.stack.contains(&nonce) || inner.spent.contains(&nonce) {
            log::debug!("Ignoring repeated nonce {nonce}");
            return;
        }

        inner.stack.push(nonce);

        if inner.stack.len() > MAX_POOLED {
            inner.stack.remove(0);
        }
    }

    /// Offers the `Replay-Nonce` of any CA response to the pool.
    pub fn extract_nonce(&self, res: &reqwest::Response) {
        if let Some(nonce) = crate::req::req_header(res, "replay-nonce") {
            log::trace!("Extracting new nonce");
            self.push(nonce);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().stack.len()
    }
}
