//! Symmetric sealed blobs.
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext.
//! Used for the storage layer's encrypted values (opaque connector state
//! threaded through upstream providers).

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};

use crate::error::{CryptoError, CryptoResult};
use crate::random::random_bytes;

/// Length in bytes of a symmetric encryption key.
pub const SYMMETRIC_KEY_LEN: usize = 32;

fn aead_key(key: &[u8]) -> CryptoResult<LessSafeKey> {
    if key.len() != SYMMETRIC_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "symmetric key must be {SYMMETRIC_KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|e| CryptoError::InvalidKey(format!("aead key: {e}")))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypts a plaintext, returning `nonce || ciphertext || tag`.
///
/// # Errors
///
/// Returns an error if the key is malformed or encryption fails.
pub fn seal(key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let aead = aead_key(key)?;
    let nonce_bytes = random_bytes(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
        .map_err(|e| CryptoError::Encryption(format!("nonce: {e}")))?;

    let mut in_out = plaintext.to_vec();
    aead.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|e| CryptoError::Encryption(format!("seal: {e}")))?;

    let mut out = nonce_bytes;
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Decrypts a blob produced by [`seal`].
///
/// # Errors
///
/// Returns an error if the blob is malformed, the key is wrong, or the
/// ciphertext fails authentication.
pub fn open(key: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    let aead = aead_key(key)?;
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::Decryption("ciphertext too short".to_string()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|e| CryptoError::Decryption(format!("nonce: {e}")))?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = aead
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))?;
    Ok(plaintext.to_vec())
}
