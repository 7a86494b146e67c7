//! Shared harness for the end-to-end scenarios.
//!
//! Boots a real server on an ephemeral port backed by the in-memory
//! storage, and drives the browser legs of the flow with a
//! non-redirect-following HTTP client so every `Location` can be asserted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oxidp_connector::mock::MockConnector;
use oxidp_connector::{Connector, PasswordConnector};
use oxidp_server::{Server, ServerConfig};
use oxidp_storage::{
    AuthCode, AuthRequest, Client, GcResult, Keys, MemoryStorage, Nonce, RefreshToken, Storage,
    StorageResult, Updater,
};

/// Storage decorator that counts `AuthRequest` creations, so scenarios can
/// assert that rejected `/auth` calls leave no state behind.
pub struct CountingStorage {
    inner: MemoryStorage,
    auth_request_creates: AtomicUsize,
}

impl CountingStorage {
    /// Wraps a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            auth_request_creates: AtomicUsize::new(0),
        }
    }

    /// Number of `create_auth_request` calls observed.
    #[must_use]
    pub fn auth_requests_created(&self) -> usize {
        self.auth_request_creates.load(Ordering::SeqCst)
    }
}

impl Default for CountingStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn create_auth_request(&self, req: AuthRequest) -> StorageResult<()> {
        self.auth_request_creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_auth_request(req).await
    }

    async fn create_client(&self, client: Client) -> StorageResult<()> {
        self.inner.create_client(client).await
    }

    async fn create_auth_code(&self, code: AuthCode) -> StorageResult<()> {
        self.inner.create_auth_code(code).await
    }

    async fn create_refresh(&self, refresh: RefreshToken) -> StorageResult<()> {
        self.inner.create_refresh(refresh).await
    }

    async fn create_nonce(&self, nonce: Nonce) -> StorageResult<()> {
        self.inner.create_nonce(nonce).await
    }

    async fn get_auth_request(&self, id: &str) -> StorageResult<AuthRequest> {
        self.inner.get_auth_request(id).await
    }

    async fn get_auth_code(&self, id: &str) -> StorageResult<AuthCode> {
        self.inner.get_auth_code(id).await
    }

    async fn get_client(&self, id: &str) -> StorageResult<Client> {
        self.inner.get_client(id).await
    }

    async fn get_keys(&self) -> StorageResult<Keys> {
        self.inner.get_keys().await
    }

    async fn get_refresh(&self, token: &str) -> StorageResult<RefreshToken> {
        self.inner.get_refresh(token).await
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        self.inner.list_clients().await
    }

    async fn list_refresh_tokens(&self) -> StorageResult<Vec<RefreshToken>> {
        self.inner.list_refresh_tokens().await
    }

    async fn delete_auth_request(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_auth_request(id).await
    }

    async fn delete_auth_code(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_auth_code(id).await
    }

    async fn delete_client(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_client(id).await
    }

    async fn delete_refresh(&self, token: &str) -> StorageResult<()> {
        self.inner.delete_refresh(token).await
    }

    async fn delete_nonce(&self, value: &str) -> StorageResult<()> {
        self.inner.delete_nonce(value).await
    }

    async fn update_client(&self, id: &str, updater: Updater<Client>) -> StorageResult<()> {
        self.inner.update_client(id, updater).await
    }

    async fn update_keys(&self, updater: Updater<Keys>) -> StorageResult<()> {
        self.inner.update_keys(updater).await
    }

    async fn update_auth_request(
        &self,
        id: &str,
        updater: Updater<AuthRequest>,
    ) -> StorageResult<()> {
        self.inner.update_auth_request(id, updater).await
    }

    async fn garbage_collect(&self, now: DateTime<Utc>) -> StorageResult<GcResult> {
        self.inner.garbage_collect(now).await
    }
}

/// A mock connector restricted to the password and groups capabilities,
/// for exercising the form-login leg of the flow.
#[derive(Debug)]
pub struct PasswordOnlyConnector {
    inner: MockConnector,
}

impl PasswordOnlyConnector {
    /// Wraps the default mock connector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MockConnector::with_defaults(),
        }
    }
}

impl Default for PasswordOnlyConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for PasswordOnlyConnector {
    fn as_password(&self) -> Option<&dyn PasswordConnector> {
        self.inner.as_password()
    }

    fn as_groups(&self) -> Option<&dyn oxidp_connector::GroupsConnector> {
        self.inner.as_groups()
    }
}

/// A running server plus the client and storage handles the scenarios use.
pub struct TestEnv {
    /// Base URL of the live server (also its issuer).
    pub base_url: String,
    /// Handle to the underlying storage, for seeding and assertions.
    pub storage: Arc<CountingStorage>,
    /// HTTP client that never follows redirects.
    pub http: reqwest::Client,
    _server: tokio::task::JoinHandle<()>,
}

impl TestEnv {
    /// Boots a server with the default callback-capable mock connector and
    /// approval skipped.
    ///
    /// # Panics
    ///
    /// Panics if the server fails to boot.
    pub async fn start() -> Self {
        let connector: Arc<dyn Connector> = Arc::new(MockConnector::with_defaults());
        Self::start_with(connector, true).await
    }

    /// Boots a server with the given single connector.
    ///
    /// # Panics
    ///
    /// Panics if the server fails to boot.
    pub async fn start_with(connector: Arc<dyn Connector>, skip_approval: bool) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{addr}");

        let mut config = ServerConfig::for_testing(&base_url);
        config.skip_approval = skip_approval;

        let storage = Arc::new(CountingStorage::new());
        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
        connectors.insert("mock".to_string(), connector);

        let server = Server::new(config, storage.clone() as Arc<dyn Storage>, connectors);
        server.ensure_keys().await.expect("bootstrap keys");
        let task = tokio::spawn(async move {
            if let Err(err) = server.serve(listener).await {
                eprintln!("server exited: {err}");
            }
        });

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client");

        let env = Self {
            base_url,
            storage,
            http,
            _server: task,
        };
        env.wait_until_healthy().await;
        env
    }

    async fn wait_until_healthy(&self) {
        for _ in 0..50 {
            if let Ok(resp) = self.http.get(self.url("/health")).send().await {
                if resp.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("server did not become healthy");
    }

    /// Builds an absolute URL under the server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Registers a confidential client.
    ///
    /// # Panics
    ///
    /// Panics if the client already exists.
    pub async fn seed_client(&self, id: &str, secret: &str, redirect_uri: &str) {
        self.storage
            .create_client(Client {
                id: id.to_string(),
                secret: secret.to_string(),
                redirect_uris: vec![redirect_uri.to_string()],
                trusted_peers: Vec::new(),
                public: false,
                name: id.to_string(),
                logo_url: String::new(),
            })
            .await
            .expect("seed client");
    }

    /// Drives the browser legs of the flow starting at `GET /auth` with the
    /// given query string, following local redirects until the server hands
    /// control back to the client application.
    ///
    /// Returns the final external redirect URL.
    ///
    /// # Panics
    ///
    /// Panics if the flow does not terminate in an external redirect.
    pub async fn run_browser_flow(&self, auth_query: &str) -> url::Url {
        let mut next = self.url(&format!("/auth?{auth_query}"));
        for _ in 0..10 {
            let response = self.http.get(&next).send().await.expect("flow request");
            let status = response.status();
            assert!(
                status.is_redirection(),
                "expected redirect from {next}, got {status}"
            );
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .expect("redirect location")
                .to_str()
                .expect("location utf-8")
                .to_string();
            if location.starts_with(&self.base_url) {
                next = location;
                continue;
            }
            return url::Url::parse(&location).expect("external redirect URL");
        }
        panic!("flow did not terminate in an external redirect");
    }

    /// Runs the full browser flow and extracts the `code` and `state`
    /// parameters of the final client redirect.
    ///
    /// # Panics
    ///
    /// Panics if the redirect carries no code.
    pub async fn obtain_code(&self, auth_query: &str) -> (String, String) {
        let redirect = self.run_browser_flow(auth_query).await;
        let params: HashMap<String, String> = redirect
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let code = params.get("code").expect("code parameter").clone();
        let state = params.get("state").cloned().unwrap_or_default();
        (code, state)
    }
}
