//! # oxidp-storage
//!
//! Storage contract for the oxidp identity provider.
//!
//! All protocol state lives behind the [`Storage`] trait: OAuth2 clients,
//! in-flight authorization requests, single-use codes, refresh tokens,
//! single-use nonces, and the signing/encryption key set. Backends must
//! provide per-key linearizable updates (compare-and-swap) and atomic
//! deletes; the flow state machine relies on `delete` as its only
//! "at most once" primitive.
//!
//! The crate ships an in-memory reference implementation
//! ([`memory::MemoryStorage`]) and a [`conformance`] suite that any backend
//! is expected to pass.

#![forbid(unsafe_code)]

pub mod conformance;
pub mod error;
pub mod keys;
pub mod memory;
pub mod storage;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use keys::{DecryptionKey, Keys, StoredSigningKey, VerificationKey};
pub use memory::MemoryStorage;
pub use storage::{GcResult, Storage, Updater};
pub use types::{AuthCode, AuthRequest, Client, Identity, Nonce, RefreshToken};
