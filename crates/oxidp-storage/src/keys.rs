//! The signing and encryption key set.
//!
//! [`Keys`] is a singleton record owned by the key rotation driver. It holds
//! the current signing key, the still-valid public keys of rotated signing
//! keys, and the symmetric keys for sealed blobs. Rotation replaces the
//! whole record through a compare-and-swap update, so readers always observe
//! an immutable snapshot.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use oxidp_crypto::{CryptoError, CryptoResult, JsonWebKey, SignatureAlgorithm, SigningKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::base64_bytes;

/// A persisted signing key: its algorithm plus the PKCS#8 private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSigningKey {
    /// Algorithm derived from the key type at generation time.
    pub algorithm: SignatureAlgorithm,

    /// PKCS#8 DER encoding of the private key.
    #[serde(with = "base64_bytes")]
    pub pkcs8: Vec<u8>,
}

impl StoredSigningKey {
    /// Loads the private key for signing.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted key no longer parses.
    pub fn load(&self) -> CryptoResult<SigningKey> {
        SigningKey::from_pkcs8(self.algorithm, &self.pkcs8)
    }
}

/// A rotated signing key's public half, still accepted for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationKey {
    /// The public key.
    pub public_key: JsonWebKey,

    /// Removed on the first rotation after this instant.
    pub expiry: DateTime<Utc>,
}

/// A rotated symmetric key, still usable for decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionKey {
    /// The 32-byte symmetric key.
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,

    /// Skipped during decryption once this instant has passed.
    pub expiry: DateTime<Utc>,
}

/// The singleton key record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keys {
    /// Current signing key. Absent until the first rotation runs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signing_key: Option<StoredSigningKey>,

    /// Public half of the current signing key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signing_key_pub: Option<JsonWebKey>,

    /// Rotated public keys still accepted at token-validation time.
    #[serde(default)]
    pub verification_keys: Vec<VerificationKey>,

    /// Current symmetric encryption key.
    #[serde(
        with = "optional_base64",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub encryption_key: Option<Vec<u8>>,

    /// Rotated symmetric keys still usable for decryption.
    #[serde(default)]
    pub decryption_keys: Vec<DecryptionKey>,

    /// The next time the keys rotate. Implementations MUST NOT rotate
    /// before this instant; readers may cache the record until then.
    pub next_rotation: DateTime<Utc>,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            signing_key: None,
            signing_key_pub: None,
            verification_keys: Vec::new(),
            encryption_key: None,
            decryption_keys: Vec::new(),
            next_rotation: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

mod optional_base64 {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&URL_SAFE_NO_PAD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| {
            URL_SAFE_NO_PAD
                .decode(s.as_bytes())
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

impl Keys {
    /// Signs a payload with the current signing key, producing a compact JWS.
    ///
    /// # Errors
    ///
    /// Returns an error if no signing key is present or signing fails.
    pub fn sign(&self, payload: &[u8]) -> CryptoResult<String> {
        let stored = self
            .signing_key
            .as_ref()
            .ok_or_else(|| CryptoError::InvalidKey("no signing key available".to_string()))?;
        stored.load()?.sign_compact(payload)
    }

    /// JSON-serializes and encrypts a value with the current encryption key,
    /// returning URL-safe base64 ciphertext.
    ///
    /// # Errors
    ///
    /// Returns an error if no encryption key is present or encryption fails.
    pub fn encrypt<T: Serialize>(&self, value: &T) -> CryptoResult<String> {
        let key = self
            .encryption_key
            .as_ref()
            .ok_or_else(|| CryptoError::InvalidKey("no encryption key available".to_string()))?;
        let plaintext =
            serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        let sealed = oxidp_crypto::seal(key, &plaintext)?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decrypts a value produced by [`Keys::encrypt`].
    ///
    /// Tries the current encryption key first, then every historical
    /// decryption key in order, skipping keys whose expiry has passed.
    /// A single key failing to decrypt is not fatal; only exhausting all
    /// keys is.
    ///
    /// # Errors
    ///
    /// Returns an error if the ciphertext is malformed, no key decrypts it,
    /// or the decrypted payload does not deserialize.
    pub fn decrypt<T: DeserializeOwned>(&self, ciphertext: &str) -> CryptoResult<T> {
        let sealed = URL_SAFE_NO_PAD
            .decode(ciphertext.as_bytes())
            .map_err(|e| CryptoError::Decryption(format!("base64 decode: {e}")))?;

        let now = Utc::now();
        let current = self.encryption_key.iter().map(|k| k.as_slice());
        let historical = self
            .decryption_keys
            .iter()
            .filter(|k| k.expiry > now)
            .map(|k| k.key.as_slice());

        for key in current.chain(historical) {
            if let Ok(plaintext) = oxidp_crypto::open(key, &sealed) {
                return serde_json::from_slice(&plaintext)
                    .map_err(|e| CryptoError::Serialization(e.to_string()));
            }
        }
        Err(CryptoError::Decryption(
            "no decryption key can open the value".to_string(),
        ))
    }
}
