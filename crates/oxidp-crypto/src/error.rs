//! Crypto error types.

use thiserror::Error;

/// Errors from key handling, signing, and sealed-blob operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A key could not be parsed or failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The key type or curve is not supported for signing.
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// A signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A sealed blob could not be opened with any available key.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Encryption of a sealed blob failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// JSON serialization of a payload or claim set failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
