//! Signing key pairs and JWS compact serialization.
//!
//! A [`SigningKey`] wraps an RSA or ECDSA private key. The JWS algorithm is
//! always derived from the key material (RSA keys sign RS256, EC keys sign
//! the variant matching their curve), so a key can never be used with the
//! wrong algorithm.

use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::encoding::{AsDer, Pkcs8V1Der};
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::rsa::KeySize;
use aws_lc_rs::signature::{
    self, EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair, RsaKeyPair,
    ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
    ECDSA_P521_SHA512_FIXED_SIGNING,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::algorithm::SignatureAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::jwk::JsonWebKey;

/// A private signing key with its derived JWS algorithm and key ID.
pub struct SigningKey {
    inner: KeyPairKind,
    algorithm: SignatureAlgorithm,
    key_id: String,
}

enum KeyPairKind {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

fn ecdsa_signing_alg(
    algorithm: SignatureAlgorithm,
) -> CryptoResult<&'static EcdsaSigningAlgorithm> {
    match algorithm {
        SignatureAlgorithm::Es256 => Ok(&ECDSA_P256_SHA256_FIXED_SIGNING),
        SignatureAlgorithm::Es384 => Ok(&ECDSA_P384_SHA384_FIXED_SIGNING),
        SignatureAlgorithm::Es512 => Ok(&ECDSA_P521_SHA512_FIXED_SIGNING),
        SignatureAlgorithm::Rs256 => Err(CryptoError::UnsupportedKey(
            "RS256 is not an ECDSA algorithm".to_string(),
        )),
    }
}

impl SigningKey {
    /// Generates a fresh key pair for the given algorithm.
    ///
    /// Returns the key together with its PKCS#8 DER encoding, which callers
    /// persist so the key survives restarts.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate(algorithm: SignatureAlgorithm) -> CryptoResult<(Self, Vec<u8>)> {
        let pkcs8 = match algorithm {
            SignatureAlgorithm::Rs256 => {
                let pair = RsaKeyPair::generate(KeySize::Rsa2048)
                    .map_err(|e| CryptoError::KeyGeneration(format!("rsa keygen: {e}")))?;
                let der: Pkcs8V1Der<'_> = pair
                    .as_der()
                    .map_err(|e| CryptoError::KeyGeneration(format!("rsa pkcs8: {e}")))?;
                der.as_ref().to_vec()
            }
            _ => {
                let alg = ecdsa_signing_alg(algorithm)?;
                let rng = SystemRandom::new();
                let doc = EcdsaKeyPair::generate_pkcs8(alg, &rng)
                    .map_err(|e| CryptoError::KeyGeneration(format!("ecdsa keygen: {e}")))?;
                doc.as_ref().to_vec()
            }
        };
        let key = Self::from_pkcs8(algorithm, &pkcs8)?;
        Ok((key, pkcs8))
    }

    /// Loads a signing key from PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not parse or does not match the
    /// algorithm's key type (an EC key on an unsupported curve is rejected
    /// here).
    pub fn from_pkcs8(algorithm: SignatureAlgorithm, pkcs8: &[u8]) -> CryptoResult<Self> {
        let inner = match algorithm {
            SignatureAlgorithm::Rs256 => {
                let pair = RsaKeyPair::from_pkcs8(pkcs8)
                    .map_err(|e| CryptoError::InvalidKey(format!("rsa pkcs8: {e}")))?;
                KeyPairKind::Rsa(pair)
            }
            _ => {
                let alg = ecdsa_signing_alg(algorithm)?;
                let pair = EcdsaKeyPair::from_pkcs8(alg, pkcs8).map_err(|e| {
                    CryptoError::InvalidKey(format!(
                        "ecdsa pkcs8 for {}: {e}",
                        algorithm.jwa_name()
                    ))
                })?;
                KeyPairKind::Ecdsa(pair)
            }
        };

        let public = match &inner {
            KeyPairKind::Rsa(pair) => pair.public_key().as_ref().to_vec(),
            KeyPairKind::Ecdsa(pair) => pair.public_key().as_ref().to_vec(),
        };
        let key_id = key_id_for(&public);

        Ok(Self {
            inner,
            algorithm,
            key_id,
        })
    }

    /// Returns the key ID, a digest of the public key bytes.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the JWS algorithm derived from the key type.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs a payload, producing a compact JWS (`header.payload.signature`).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying signing operation fails.
    pub fn sign_compact(&self, payload: &[u8]) -> CryptoResult<String> {
        let header = serde_json::json!({
            "alg": self.algorithm.jwa_name(),
            "kid": self.key_id,
        });
        let header = serde_json::to_vec(&header)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let rng = SystemRandom::new();
        let sig = match &self.inner {
            KeyPairKind::Rsa(pair) => {
                let mut sig = vec![0u8; pair.public_modulus_len()];
                pair.sign(
                    &signature::RSA_PKCS1_SHA256,
                    &rng,
                    signing_input.as_bytes(),
                    &mut sig,
                )
                .map_err(|e| CryptoError::Signing(format!("rsa: {e}")))?;
                sig
            }
            KeyPairKind::Ecdsa(pair) => pair
                .sign(&rng, signing_input.as_bytes())
                .map_err(|e| CryptoError::Signing(format!("ecdsa: {e}")))?
                .as_ref()
                .to_vec(),
        };

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig)))
    }

    /// Exports the public half as a JSON Web Key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key bytes cannot be decomposed into
    /// JWK components.
    pub fn public_jwk(&self) -> CryptoResult<JsonWebKey> {
        match &self.inner {
            KeyPairKind::Rsa(pair) => {
                let (n, e) = parse_rsa_public(pair.public_key().as_ref())?;
                Ok(JsonWebKey::rsa_public(&self.key_id, self.algorithm, &n, &e))
            }
            KeyPairKind::Ecdsa(pair) => {
                let curve = self
                    .algorithm
                    .curve_name()
                    .ok_or_else(|| CryptoError::UnsupportedKey(self.algorithm.to_string()))?;
                let coord = self
                    .algorithm
                    .coordinate_length()
                    .ok_or_else(|| CryptoError::UnsupportedKey(self.algorithm.to_string()))?;
                let (x, y) = split_ec_point(pair.public_key().as_ref(), coord)?;
                Ok(JsonWebKey::ec_public(
                    &self.key_id,
                    self.algorithm,
                    curve,
                    &x,
                    &y,
                ))
            }
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Derives a key ID from public key bytes.
fn key_id_for(public_key: &[u8]) -> String {
    let hash = digest(&SHA256, public_key);
    URL_SAFE_NO_PAD.encode(&hash.as_ref()[..8])
}

/// Splits an uncompressed EC point (`0x04 || x || y`) into coordinates.
fn split_ec_point(point: &[u8], coord_len: usize) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
    // The point may be wrapped in a SubjectPublicKeyInfo; locate the
    // uncompressed-point marker and take the fixed-length coordinates.
    let start = point
        .iter()
        .position(|&b| b == 0x04)
        .ok_or_else(|| CryptoError::InvalidKey("no uncompressed EC point marker".to_string()))?;
    let expected = 1 + coord_len * 2;
    if point.len() < start + expected {
        return Err(CryptoError::InvalidKey("EC public key too short".to_string()));
    }
    let x = point[start + 1..start + 1 + coord_len].to_vec();
    let y = point[start + 1 + coord_len..start + expected].to_vec();
    Ok((x, y))
}

/// Extracts the RSA modulus and exponent from DER public key bytes.
///
/// Accepts both a bare `RSAPublicKey` (`SEQUENCE { n, e }`) and a full
/// `SubjectPublicKeyInfo` wrapping one.
fn parse_rsa_public(der: &[u8]) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
    let mut cursor = Der::new(der);
    let mut seq = cursor.sequence()?;

    // SPKI: the first element of the outer sequence is the algorithm
    // identifier sequence, followed by a BIT STRING holding RSAPublicKey.
    if seq.peek_tag()? == 0x30 {
        seq.skip_element()?;
        let bits = seq.bit_string()?;
        let mut inner = Der::new(bits);
        seq = inner.sequence()?;
        let n = seq.integer()?;
        let e = seq.integer()?;
        return Ok((n, e));
    }

    let n = seq.integer()?;
    let e = seq.integer()?;
    Ok((n, e))
}

/// Minimal DER reader for the public key shapes above.
struct Der<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Der<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn byte(&mut self) -> CryptoResult<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| CryptoError::InvalidKey("truncated DER".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn peek_tag(&self) -> CryptoResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| CryptoError::InvalidKey("truncated DER".to_string()))
    }

    fn length(&mut self) -> CryptoResult<usize> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7F) as usize;
        if count > 4 {
            return Err(CryptoError::InvalidKey("DER length too large".to_string()));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.byte()? as usize;
        }
        Ok(len)
    }

    fn expect(&mut self, tag: u8) -> CryptoResult<&'a [u8]> {
        let got = self.byte()?;
        if got != tag {
            return Err(CryptoError::InvalidKey(format!(
                "expected DER tag {tag:#04x}, got {got:#04x}"
            )));
        }
        let len = self.length()?;
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(CryptoError::InvalidKey("truncated DER".to_string()));
        }
        let contents = &self.data[self.pos..end];
        self.pos = end;
        Ok(contents)
    }

    fn sequence(&mut self) -> CryptoResult<Der<'a>> {
        Ok(Der::new(self.expect(0x30)?))
    }

    fn bit_string(&mut self) -> CryptoResult<&'a [u8]> {
        let contents = self.expect(0x03)?;
        // First octet is the unused-bits count, always zero here.
        contents
            .split_first()
            .map(|(_, rest)| rest)
            .ok_or_else(|| CryptoError::InvalidKey("empty BIT STRING".to_string()))
    }

    fn skip_element(&mut self) -> CryptoResult<()> {
        let tag = self.byte()?;
        let _ = tag;
        let len = self.length()?;
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(CryptoError::InvalidKey("truncated DER".to_string()));
        }
        self.pos = end;
        Ok(())
    }

    fn integer(&mut self) -> CryptoResult<Vec<u8>> {
        let mut contents = self.expect(0x02)?.to_vec();
        // Strip the ASN.1 sign-padding zero so JWK components are minimal.
        if contents.len() > 1 && contents[0] == 0 {
            contents.remove(0);
        }
        Ok(contents)
    }
}
