//! Application state shared across request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use oxidp_connector::Connector;
use oxidp_storage::Storage;

use crate::config::ServerConfig;
use crate::rotation::KeysCache;

/// State handed to every request handler.
///
/// Handlers share no mutable in-process state beyond the storage, the
/// cached key set, and the immutable connector registry.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Protocol state persistence.
    pub storage: Arc<dyn Storage>,

    /// Name-indexed connectors, fixed at startup.
    pub connectors: Arc<HashMap<String, Arc<dyn Connector>>>,

    /// Read-through cache of the key set, bounded by the next rotation.
    pub keys: KeysCache,
}

impl AppState {
    /// Creates the application state.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        connectors: HashMap<String, Arc<dyn Connector>>,
    ) -> Self {
        let keys = KeysCache::new(storage.clone());
        Self {
            config: Arc::new(config),
            storage,
            connectors: Arc::new(connectors),
            keys,
        }
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// Builds an absolute URL under the issuer.
    #[must_use]
    pub fn abs_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.issuer)
    }
}
