//! The storage contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::keys::Keys;
use crate::types::{AuthCode, AuthRequest, Client, Nonce, RefreshToken};

/// A reader-modifier-writer function for compare-and-swap updates.
///
/// The store re-reads the current value, applies the function, and commits
/// iff no concurrent writer changed the record in between; otherwise the
/// update fails with a retryable [`crate::StorageError::Conflict`].
pub type Updater<T> = Box<dyn FnOnce(T) -> StorageResult<T> + Send>;

/// Counts of expired records removed by a garbage collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcResult {
    /// Expired authorization requests removed.
    pub auth_requests: usize,
    /// Expired authorization codes removed.
    pub auth_codes: usize,
    /// Expired refresh tokens removed.
    pub refresh_tokens: usize,
    /// Expired nonces removed.
    pub nonces: usize,
}

impl GcResult {
    /// Total number of records removed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.auth_requests + self.auth_codes + self.refresh_tokens + self.nonces
    }
}

/// Durable, consistent persistence for every protocol record.
///
/// ## Contracts
///
/// - `get_*` returns [`crate::StorageError::NotFound`] for both absent and
///   expired records; callers do not distinguish.
/// - `delete_*` is atomic and idempotent: deleting a missing record returns
///   `NotFound`, deleting a present record either fully succeeds or fully
///   fails. Every "at most once" step in the flow gates on a successful
///   delete.
/// - `create_nonce` fails with [`crate::StorageError::AlreadyExists`] if the
///   value is present; claiming a nonce is `delete_nonce`, so a double claim
///   is impossible.
/// - `update_*` serializes per key: concurrent updates on the same key are
///   ordered, updates on distinct keys may proceed in parallel.
/// - Implementations garbage-collect expired auth requests, codes, refresh
///   tokens and nonces. Key rotation is driven by the key manager, not GC.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores a new authorization request.
    async fn create_auth_request(&self, req: AuthRequest) -> StorageResult<()>;

    /// Registers a new client.
    async fn create_client(&self, client: Client) -> StorageResult<()>;

    /// Stores a new authorization code.
    async fn create_auth_code(&self, code: AuthCode) -> StorageResult<()>;

    /// Stores a new refresh token.
    async fn create_refresh(&self, refresh: RefreshToken) -> StorageResult<()>;

    /// Stores a single-use nonce. Fails with `AlreadyExists` if present.
    async fn create_nonce(&self, nonce: Nonce) -> StorageResult<()>;

    /// Fetches an authorization request by ID.
    async fn get_auth_request(&self, id: &str) -> StorageResult<AuthRequest>;

    /// Fetches an authorization code by its value.
    async fn get_auth_code(&self, id: &str) -> StorageResult<AuthCode>;

    /// Fetches a client by ID.
    async fn get_client(&self, id: &str) -> StorageResult<Client>;

    /// Fetches the singleton key set.
    async fn get_keys(&self) -> StorageResult<Keys>;

    /// Fetches a refresh token by its value.
    async fn get_refresh(&self, token: &str) -> StorageResult<RefreshToken>;

    /// Lists all registered clients.
    async fn list_clients(&self) -> StorageResult<Vec<Client>>;

    /// Lists all live refresh tokens.
    async fn list_refresh_tokens(&self) -> StorageResult<Vec<RefreshToken>>;

    /// Deletes an authorization request.
    async fn delete_auth_request(&self, id: &str) -> StorageResult<()>;

    /// Deletes an authorization code. The flow's single-use guarantee.
    async fn delete_auth_code(&self, id: &str) -> StorageResult<()>;

    /// Deletes a client.
    async fn delete_client(&self, id: &str) -> StorageResult<()>;

    /// Deletes a refresh token. The flow's rotation guarantee.
    async fn delete_refresh(&self, token: &str) -> StorageResult<()>;

    /// Claims a nonce. `NotFound` means it was already claimed or expired.
    async fn delete_nonce(&self, value: &str) -> StorageResult<()>;

    /// Updates a client under compare-and-swap semantics.
    async fn update_client(&self, id: &str, updater: Updater<Client>) -> StorageResult<()>;

    /// Updates the key set under compare-and-swap semantics.
    ///
    /// On the very first update the updater receives a default (empty)
    /// record so bootstrap and rotation share one code path.
    async fn update_keys(&self, updater: Updater<Keys>) -> StorageResult<()>;

    /// Updates an authorization request under compare-and-swap semantics.
    async fn update_auth_request(
        &self,
        id: &str,
        updater: Updater<AuthRequest>,
    ) -> StorageResult<()>;

    /// Removes records whose expiry has passed.
    async fn garbage_collect(&self, now: DateTime<Utc>) -> StorageResult<GcResult>;
}
