//! Cryptographically secure token identifiers.
//!
//! Protocol object IDs (auth requests, auth codes, refresh tokens, nonces)
//! are 64-bit values from a CSPRNG, URL-safe base64-encoded without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Generates a cryptographically secure byte vector of the given length.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Returns a fresh 64-bit random identifier, URL-safe base64 without padding.
///
/// Used for every protocol object ID and for opaque access tokens.
#[must_use]
pub fn new_token_id() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(8))
}
