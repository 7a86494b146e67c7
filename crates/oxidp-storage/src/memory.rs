//! In-memory reference storage.
//!
//! Backs tests and single-process deployments. A single mutex serializes
//! all operations, which trivially satisfies the per-key CAS contract;
//! expired records are treated as absent on read and reaped by
//! [`Storage::garbage_collect`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::keys::Keys;
use crate::storage::{GcResult, Storage, Updater};
use crate::types::{AuthCode, AuthRequest, Client, Nonce, RefreshToken};

/// In-memory [`Storage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    clients: HashMap<String, Client>,
    auth_requests: HashMap<String, AuthRequest>,
    auth_codes: HashMap<String, AuthCode>,
    refresh_tokens: HashMap<String, RefreshToken>,
    nonces: HashMap<String, DateTime<Utc>>,
    keys: Option<Keys>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn expired(expiry: DateTime<Utc>) -> bool {
    Utc::now() >= expiry
}

fn insert_new<T>(map: &mut HashMap<String, T>, id: String, value: T) -> StorageResult<()> {
    if map.contains_key(&id) {
        return Err(StorageError::AlreadyExists);
    }
    map.insert(id, value);
    Ok(())
}

fn remove<T>(map: &mut HashMap<String, T>, id: &str) -> StorageResult<()> {
    map.remove(id).map(|_| ()).ok_or(StorageError::NotFound)
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_auth_request(&self, req: AuthRequest) -> StorageResult<()> {
        let mut state = self.state.lock();
        insert_new(&mut state.auth_requests, req.id.clone(), req)
    }

    async fn create_client(&self, client: Client) -> StorageResult<()> {
        let mut state = self.state.lock();
        insert_new(&mut state.clients, client.id.clone(), client)
    }

    async fn create_auth_code(&self, code: AuthCode) -> StorageResult<()> {
        let mut state = self.state.lock();
        insert_new(&mut state.auth_codes, code.id.clone(), code)
    }

    async fn create_refresh(&self, refresh: RefreshToken) -> StorageResult<()> {
        let mut state = self.state.lock();
        insert_new(&mut state.refresh_tokens, refresh.token.clone(), refresh)
    }

    async fn create_nonce(&self, nonce: Nonce) -> StorageResult<()> {
        let mut state = self.state.lock();
        // An expired nonce no longer blocks re-use of the value.
        if let Some(expiry) = state.nonces.get(&nonce.value) {
            if !expired(*expiry) {
                return Err(StorageError::AlreadyExists);
            }
        }
        state.nonces.insert(nonce.value, nonce.expiry);
        Ok(())
    }

    async fn get_auth_request(&self, id: &str) -> StorageResult<AuthRequest> {
        let state = self.state.lock();
        match state.auth_requests.get(id) {
            Some(req) if !expired(req.expiry) => Ok(req.clone()),
            _ => Err(StorageError::NotFound),
        }
    }

    async fn get_auth_code(&self, id: &str) -> StorageResult<AuthCode> {
        let state = self.state.lock();
        match state.auth_codes.get(id) {
            Some(code) if !expired(code.expiry) => Ok(code.clone()),
            _ => Err(StorageError::NotFound),
        }
    }

    async fn get_client(&self, id: &str) -> StorageResult<Client> {
        let state = self.state.lock();
        state.clients.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_keys(&self) -> StorageResult<Keys> {
        let state = self.state.lock();
        state.keys.clone().ok_or(StorageError::NotFound)
    }

    async fn get_refresh(&self, token: &str) -> StorageResult<RefreshToken> {
        let state = self.state.lock();
        match state.refresh_tokens.get(token) {
            Some(refresh) if !expired(refresh.expiry) => Ok(refresh.clone()),
            _ => Err(StorageError::NotFound),
        }
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        let state = self.state.lock();
        Ok(state.clients.values().cloned().collect())
    }

    async fn list_refresh_tokens(&self) -> StorageResult<Vec<RefreshToken>> {
        let state = self.state.lock();
        Ok(state
            .refresh_tokens
            .values()
            .filter(|r| !expired(r.expiry))
            .cloned()
            .collect())
    }

    async fn delete_auth_request(&self, id: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        remove(&mut state.auth_requests, id)
    }

    async fn delete_auth_code(&self, id: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        remove(&mut state.auth_codes, id)
    }

    async fn delete_client(&self, id: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        remove(&mut state.clients, id)
    }

    async fn delete_refresh(&self, token: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        remove(&mut state.refresh_tokens, token)
    }

    async fn delete_nonce(&self, value: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        match state.nonces.remove(value) {
            Some(expiry) if !expired(expiry) => Ok(()),
            _ => Err(StorageError::NotFound),
        }
    }

    async fn update_client(&self, id: &str, updater: Updater<Client>) -> StorageResult<()> {
        let mut state = self.state.lock();
        let current = state.clients.get(id).cloned().ok_or(StorageError::NotFound)?;
        let updated = updater(current)?;
        state.clients.insert(id.to_string(), updated);
        Ok(())
    }

    async fn update_keys(&self, updater: Updater<Keys>) -> StorageResult<()> {
        let mut state = self.state.lock();
        let current = state.keys.clone().unwrap_or_default();
        let updated = updater(current)?;
        state.keys = Some(updated);
        Ok(())
    }

    async fn update_auth_request(
        &self,
        id: &str,
        updater: Updater<AuthRequest>,
    ) -> StorageResult<()> {
        let mut state = self.state.lock();
        let current = match state.auth_requests.get(id) {
            Some(req) if !expired(req.expiry) => req.clone(),
            _ => return Err(StorageError::NotFound),
        };
        let updated = updater(current)?;
        state.auth_requests.insert(id.to_string(), updated);
        Ok(())
    }

    async fn garbage_collect(&self, now: DateTime<Utc>) -> StorageResult<GcResult> {
        let mut state = self.state.lock();
        let mut result = GcResult::default();

        let before = state.auth_requests.len();
        state.auth_requests.retain(|_, r| r.expiry > now);
        result.auth_requests = before - state.auth_requests.len();

        let before = state.auth_codes.len();
        state.auth_codes.retain(|_, c| c.expiry > now);
        result.auth_codes = before - state.auth_codes.len();

        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, r| r.expiry > now);
        result.refresh_tokens = before - state.refresh_tokens.len();

        let before = state.nonces.len();
        state.nonces.retain(|_, expiry| *expiry > now);
        result.nonces = before - state.nonces.len();

        Ok(result)
    }
}
