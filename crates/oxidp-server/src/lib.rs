//! # oxidp-server
//!
//! The HTTP server of the oxidp identity provider: the authorization flow
//! state machine, the token endpoint, discovery and JWKS, key rotation,
//! and storage garbage collection.

#![forbid(unsafe_code)]

pub mod config;
pub mod handlers;
pub mod rotation;
pub mod router;
pub mod state;
pub mod templates;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use oxidp_connector::Connector;
use oxidp_storage::Storage;

pub use config::ServerConfig;
pub use rotation::{KeyRotator, KeysCache, RotationStrategy};
pub use state::AppState;

/// How often expired records are garbage collected.
const GC_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// The assembled identity provider.
pub struct Server {
    state: AppState,
    rotator: Arc<KeyRotator>,
}

impl Server {
    /// Assembles a server from its configuration, storage, and connector
    /// registry.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        connectors: HashMap<String, Arc<dyn Connector>>,
    ) -> Self {
        let strategy = RotationStrategy {
            period: config.rotation_duration(),
            token_validity: config.id_token_duration(),
            algorithm: config.signing_algorithm,
        };
        let rotator = Arc::new(KeyRotator::new(storage.clone(), strategy));
        let state = AppState::new(config, storage, connectors);
        Self { state, rotator }
    }

    /// Returns the shared application state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Builds the router for this server.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        router::create_router(self.state.clone())
    }

    /// Ensures an initial key set exists so the first token request never
    /// races the rotation task.
    ///
    /// # Errors
    ///
    /// Returns an error if key bootstrap fails.
    pub async fn ensure_keys(&self) -> anyhow::Result<()> {
        self.rotator.rotate_if_due().await?;
        Ok(())
    }

    /// Spawns the key rotation and storage GC background tasks.
    pub fn start_background_tasks(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let rotation = self.rotator.clone().start();

        let storage = self.state.storage.clone();
        let gc = tokio::spawn(async move {
            loop {
                tokio::time::sleep(GC_INTERVAL).await;
                match storage.garbage_collect(Utc::now()).await {
                    Ok(result) if result.total() > 0 => {
                        tracing::debug!(
                            auth_requests = result.auth_requests,
                            auth_codes = result.auth_codes,
                            refresh_tokens = result.refresh_tokens,
                            nonces = result.nonces,
                            "garbage collected expired records"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "garbage collection failed"),
                }
            }
        });

        vec![rotation, gc]
    }

    /// Serves requests on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        self.ensure_keys().await?;
        let _tasks = self.start_background_tasks();
        tracing::info!(issuer = %self.state.config.issuer, "serving requests");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Binds the configured address and serves requests.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "listening");
        self.serve(listener).await
    }
}
