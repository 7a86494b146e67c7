//! JWS signature algorithms.
//!
//! The algorithm is always derived from the key material: RSA private keys
//! sign RS256, EC keys sign the variant matching their curve. Callers never
//! pick an algorithm independently of the key.

use serde::{Deserialize, Serialize};

/// Supported JWS signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,

    /// ECDSA with P-256 and SHA-256.
    #[serde(rename = "ES256")]
    Es256,

    /// ECDSA with P-384 and SHA-384.
    #[serde(rename = "ES384")]
    Es384,

    /// ECDSA with P-521 and SHA-512.
    #[serde(rename = "ES512")]
    Es512,
}

impl SignatureAlgorithm {
    /// Returns the JWA name used in JWS headers and JWK `alg` fields.
    #[must_use]
    pub const fn jwa_name(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
        }
    }

    /// Checks if this is an RSA algorithm.
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        matches!(self, Self::Rs256)
    }

    /// Checks if this is an ECDSA algorithm.
    #[must_use]
    pub const fn is_ecdsa(self) -> bool {
        !self.is_rsa()
    }

    /// Returns the JWK curve name for ECDSA algorithms.
    #[must_use]
    pub const fn curve_name(self) -> Option<&'static str> {
        match self {
            Self::Rs256 => None,
            Self::Es256 => Some("P-256"),
            Self::Es384 => Some("P-384"),
            Self::Es512 => Some("P-521"),
        }
    }

    /// Returns the fixed coordinate length in bytes for ECDSA curves.
    #[must_use]
    pub const fn coordinate_length(self) -> Option<usize> {
        match self {
            Self::Rs256 => None,
            Self::Es256 => Some(32),
            Self::Es384 => Some(48),
            Self::Es512 => Some(66),
        }
    }
}

impl std::str::FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            "ES384" => Ok(Self::Es384),
            "ES512" => Ok(Self::Es512),
            other => Err(format!("unknown signature algorithm {other:?}")),
        }
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.jwa_name())
    }
}
