//! Lifecycle-scoped connection cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::{self, ClientOptions, DatabaseClient};
use crate::error::Result;

/// Connects on first use and returns the cached handle afterwards.
///
/// Constructed once per run and passed by reference. Handles are shared by
/// the two concurrent executions of a statement, so callers must not assume
/// exclusive access.
pub struct ConnectionProvider {
    options: ClientOptions,
    clients: Mutex<HashMap<String, Arc<dyn DatabaseClient>>>,
}

impl ConnectionProvider {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle for `url`, connecting if none is cached yet.
    ///
    /// The cache lock is held while connecting, so concurrent callers asking
    /// for the same source share one connection attempt.
    pub async fn get(&self, url: &str) -> Result<Arc<dyn DatabaseClient>> {
        self.get_with(url, &self.options).await
    }

    /// Like [`ConnectionProvider::get`], with options for this source only.
    ///
    /// Options only apply when a new connection is made.
    pub async fn get_with(
        &self,
        url: &str,
        options: &ClientOptions,
    ) -> Result<Arc<dyn DatabaseClient>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(url) {
            debug!("Reusing cached connection");
            return Ok(Arc::clone(client));
        }

        let client = db::connect(url, options).await?;
        info!("Connected to {}", db::DatabaseBackend::from_url(url)?.as_str());
        clients.insert(url.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Registers an existing handle under `id`, replacing any cached one.
    pub async fn insert(&self, id: impl Into<String>, client: Arc<dyn DatabaseClient>) {
        self.clients.lock().await.insert(id.into(), client);
    }

    /// Number of cached handles.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Closes every cached handle and empties the cache.
    ///
    /// All handles are closed even if some fail; the first failure is
    /// returned.
    pub async fn close_all(&self) -> Result<()> {
        let clients: Vec<_> = self.clients.lock().await.drain().collect();
        let mut first_error = None;
        for (_, client) in clients {
            if let Err(e) = client.close().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for ConnectionProvider {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}
