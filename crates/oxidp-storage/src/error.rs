//! Storage error types.

use thiserror::Error;

/// Errors returned by storage backends.
///
/// Callers do not distinguish absent from expired records: both surface as
/// [`StorageError::NotFound`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record does not exist or has expired.
    #[error("not found")]
    NotFound,

    /// A record with the same identifier already exists.
    #[error("already exists")]
    AlreadyExists,

    /// A compare-and-swap update lost a race with a concurrent writer.
    ///
    /// Retryable: re-read and re-apply the updater.
    #[error("update conflict")]
    Conflict,

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend failed in a way the caller cannot recover from.
    #[error("storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Checks if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Checks if this is an already-exists error.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }

    /// Checks if this is a retryable CAS conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
