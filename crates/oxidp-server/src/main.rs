//! oxidp server entry point.
//!
//! Wires the environment configuration, the in-memory storage, and the
//! connector registry together. Real deployments provision clients and
//! connectors through their own startup tooling; the optional
//! `OXIDP_CLIENT_*` variables seed a single demo client for local runs.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use oxidp_connector::{Connector, ConnectorRegistry};
use oxidp_server::{Server, ServerConfig};
use oxidp_storage::{Client, MemoryStorage, Storage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

    if let Some(client) = demo_client_from_env() {
        tracing::info!(client_id = %client.id, "seeding demo client");
        storage.create_client(client).await?;
    }

    let mut registry = ConnectorRegistry::new();
    registry.register("mock", Box::new(oxidp_connector::mock::MockFactory))?;

    let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
    connectors.insert(
        "mock".to_string(),
        registry.open("mock", &serde_json::json!({}))?,
    );

    Server::new(config, storage, connectors).run().await
}

/// Builds a demo client from `OXIDP_CLIENT_ID` / `OXIDP_CLIENT_SECRET` /
/// `OXIDP_CLIENT_REDIRECT_URI`, if set.
fn demo_client_from_env() -> Option<Client> {
    let id = std::env::var("OXIDP_CLIENT_ID").ok()?;
    let secret = std::env::var("OXIDP_CLIENT_SECRET").unwrap_or_default();
    let redirect_uris = std::env::var("OXIDP_CLIENT_REDIRECT_URI")
        .map(|uri| vec![uri])
        .unwrap_or_default();
    Some(Client {
        id: id.clone(),
        secret,
        redirect_uris,
        trusted_peers: Vec::new(),
        public: false,
        name: id,
        logo_url: String::new(),
    })
}
