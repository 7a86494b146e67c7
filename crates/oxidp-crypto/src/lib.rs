//! # oxidp-crypto
//!
//! Cryptographic primitives for the oxidp identity provider:
//!
//! - Signing key pairs (RSA and NIST-curve ECDSA) with JWS compact
//!   serialization
//! - JSON Web Key / JWKS types for the public key set
//! - Symmetric sealed blobs (AES-256-GCM) for opaque connector state
//! - Cryptographically secure token identifiers

#![forbid(unsafe_code)]

pub mod algorithm;
pub mod error;
pub mod jwk;
pub mod random;
pub mod sealed;
pub mod signer;

pub use algorithm::SignatureAlgorithm;
pub use error::{CryptoError, CryptoResult};
pub use jwk::{JsonWebKey, JsonWebKeySet};
pub use random::new_token_id;
pub use sealed::{open, seal, SYMMETRIC_KEY_LEN};
pub use signer::SigningKey;
