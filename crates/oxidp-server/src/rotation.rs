//! Key rotation and the in-memory key cache.
//!
//! Rotation replaces the `Keys` record through a compare-and-swap update:
//! a new signing key pair and symmetric key are generated, the outgoing
//! public key joins the verification list with a bounded validity, and
//! expired historical keys are pruned. The record's `next_rotation` is a
//! hard floor: the rotator never acts before it, and the update closure
//! re-checks it so concurrent rotators cannot double-rotate.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use oxidp_crypto::{CryptoError, SignatureAlgorithm, SigningKey, SYMMETRIC_KEY_LEN};
use oxidp_storage::{
    DecryptionKey, Keys, Storage, StorageError, StoredSigningKey, VerificationKey,
};
use parking_lot::RwLock;
use thiserror::Error;

/// How often the background task checks whether rotation is due.
const ROTATION_CHECK_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Errors from key rotation.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The key record could not be read or written.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Key generation failed.
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
}

/// Rotation timing parameters.
#[derive(Debug, Clone, Copy)]
pub struct RotationStrategy {
    /// Time between rotations.
    pub period: Duration,

    /// Lifetime of tokens signed with a key. Verification keys must stay
    /// valid for a full rotation period plus this, so tokens issued just
    /// before a rotation still verify.
    pub token_validity: Duration,

    /// Algorithm for generated signing keys.
    pub algorithm: SignatureAlgorithm,
}

impl RotationStrategy {
    /// How long a rotated key remains usable for verification/decryption.
    #[must_use]
    pub fn retired_key_validity(&self) -> Duration {
        self.period + self.token_validity
    }
}

/// Drives scheduled rotation of the `Keys` record.
pub struct KeyRotator {
    storage: Arc<dyn Storage>,
    strategy: RotationStrategy,
}

impl KeyRotator {
    /// Creates a rotator over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, strategy: RotationStrategy) -> Self {
        Self { storage, strategy }
    }

    /// Rotates the key set if `next_rotation` has passed.
    ///
    /// The very first call bootstraps the record, since an absent record
    /// defaults to a rotation time in the distant past.
    ///
    /// Returns `true` if this call observed a due rotation.
    ///
    /// # Errors
    ///
    /// Returns an error if storage or key generation fails.
    pub async fn rotate_if_due(&self) -> Result<bool, RotationError> {
        let now = Utc::now();
        match self.storage.get_keys().await {
            Ok(keys) if now < keys.next_rotation => return Ok(false),
            Ok(_) | Err(StorageError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let strategy = self.strategy;
        self.storage
            .update_keys(Box::new(move |keys| rotate(keys, &strategy, now)))
            .await?;
        tracing::info!(algorithm = %self.strategy.algorithm, "rotated signing keys");
        Ok(true)
    }

    /// Runs the rotation loop until the task is aborted.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.rotate_if_due().await {
                    tracing::error!(error = %err, "key rotation failed");
                }
                tokio::time::sleep(ROTATION_CHECK_INTERVAL).await;
            }
        })
    }
}

/// The rotation step, applied under the storage CAS update.
fn rotate(
    mut keys: Keys,
    strategy: &RotationStrategy,
    now: DateTime<Utc>,
) -> Result<Keys, StorageError> {
    // A concurrent rotator may have won the race after our read.
    if now < keys.next_rotation {
        return Ok(keys);
    }

    let (signing_key, pkcs8) = SigningKey::generate(strategy.algorithm)
        .map_err(|e| StorageError::Internal(format!("generate signing key: {e}")))?;
    let public = signing_key
        .public_jwk()
        .map_err(|e| StorageError::Internal(format!("export public key: {e}")))?;

    let retired_until = now + strategy.retired_key_validity();

    if let Some(old_public) = keys.signing_key_pub.take() {
        keys.verification_keys.push(VerificationKey {
            public_key: old_public,
            expiry: retired_until,
        });
    }
    keys.verification_keys.retain(|key| key.expiry > now);

    if let Some(old_key) = keys.encryption_key.take() {
        keys.decryption_keys.push(DecryptionKey {
            key: old_key,
            expiry: retired_until,
        });
    }
    keys.decryption_keys.retain(|key| key.expiry > now);

    keys.signing_key = Some(StoredSigningKey {
        algorithm: strategy.algorithm,
        pkcs8,
    });
    keys.signing_key_pub = Some(public);
    keys.encryption_key = Some(oxidp_crypto::random::random_bytes(SYMMETRIC_KEY_LEN));
    keys.next_rotation = now + strategy.period;
    Ok(keys)
}

/// Read-through cache of the `Keys` record.
///
/// The record is read on every token and JWKS request; the cache holds a
/// snapshot until `next_rotation`, the instant before which the record
/// cannot change.
#[derive(Clone)]
pub struct KeysCache {
    storage: Arc<dyn Storage>,
    cached: Arc<RwLock<Option<Keys>>>,
}

impl KeysCache {
    /// Creates an empty cache over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the current key set, hitting storage only when the cached
    /// snapshot has reached its rotation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is absent or storage fails.
    pub async fn get(&self) -> Result<Keys, StorageError> {
        {
            let cached = self.cached.read();
            if let Some(keys) = cached.as_ref() {
                if Utc::now() < keys.next_rotation {
                    return Ok(keys.clone());
                }
            }
        }

        let keys = self.storage.get_keys().await?;
        *self.cached.write() = Some(keys.clone());
        Ok(keys)
    }

    /// Drops the cached snapshot, forcing the next read through to
    /// storage.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }
}
