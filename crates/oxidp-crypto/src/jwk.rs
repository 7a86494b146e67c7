//! JSON Web Key types.
//!
//! Implements the subset of RFC 7517 needed for the public key set served
//! at the JWKS endpoint: RSA and EC public signature keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::algorithm::SignatureAlgorithm;

/// JSON Web Key Set, as served by the JWKS endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// The keys in the set.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Creates a JWKS holding the given keys.
    #[must_use]
    pub const fn with_keys(keys: Vec<JsonWebKey>) -> Self {
        Self { keys }
    }

    /// Finds a key by its ID.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// A public JSON Web Key.
///
/// Only signature keys are represented; the `use` field is always `"sig"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Public key use, always "sig".
    #[serde(rename = "use")]
    pub key_use: String,

    /// JWA algorithm name.
    pub alg: String,

    /// Key ID.
    pub kid: String,

    /// RSA modulus (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl JsonWebKey {
    /// Creates an RSA public signature key.
    #[must_use]
    pub fn rsa_public(
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        modulus: &[u8],
        exponent: &[u8],
    ) -> Self {
        Self {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: algorithm.jwa_name().to_string(),
            kid: kid.into(),
            n: Some(URL_SAFE_NO_PAD.encode(modulus)),
            e: Some(URL_SAFE_NO_PAD.encode(exponent)),
            crv: None,
            x: None,
            y: None,
        }
    }

    /// Creates an EC public signature key.
    #[must_use]
    pub fn ec_public(
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        curve: &str,
        x: &[u8],
        y: &[u8],
    ) -> Self {
        Self {
            kty: "EC".to_string(),
            key_use: "sig".to_string(),
            alg: algorithm.jwa_name().to_string(),
            kid: kid.into(),
            n: None,
            e: None,
            crv: Some(curve.to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(x)),
            y: Some(URL_SAFE_NO_PAD.encode(y)),
        }
    }

    /// Checks if this is an RSA key.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA"
    }
}
