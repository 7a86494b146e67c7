//! ID token claims assembly and signing.
//!
//! Claims are scope-driven: `email`, `profile`, and `groups` add their
//! claims, and cross-client scopes extend the audience after re-validating
//! peer trust against current storage. The audience keeps the OIDC
//! convention of serializing as a bare string when it has one element and
//! as an array otherwise; `azp` is set only when cross-client peers were
//! added.

use chrono::{DateTime, Duration, Utc};
use oxidp_crypto::CryptoError;
use oxidp_storage::{Identity, Keys, Storage, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::validate_cross_client_trust;
use crate::scopes::{parse_cross_client_scope, SCOPE_EMAIL, SCOPE_GROUPS, SCOPE_PROFILE};

/// The `aud` claim.
///
/// Serialized as a string when it holds one element, as an array otherwise.
/// Downstream OIDC libraries depend on this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience(pub Vec<String>);

impl Serialize for Audience {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            serializer.serialize_str(&self.0[0])
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(aud) => Self(vec![aud]),
            Repr::Many(aud) => Self(aud),
        })
    }
}

/// Claims carried by an issued ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject: the connector-scoped user ID.
    pub sub: String,

    /// Audience: the requesting client, or the cross-client peers.
    pub aud: Audience,

    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Authorized party; present only when cross-client peers were added
    /// to the audience.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub azp: Option<String>,

    /// Nonce echoed from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nonce: Option<String>,

    /// Email, under the `email` scope.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,

    /// Email verification status, under the `email` scope. Tri-state:
    /// absent without the scope, else explicitly `true` or `false`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email_verified: Option<bool>,

    /// Group memberships, under the `groups` scope.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub groups: Option<Vec<String>>,

    /// Display name, under the `profile` scope.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

/// Faults while building or signing an ID token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// A cross-client scope named a peer that does not trust the client.
    #[error("peer {0:?} does not trust client")]
    UntrustedPeer(String),

    /// Peer trust could not be re-validated against storage.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Signing failed.
    #[error("sign claims: {0}")]
    Crypto(#[from] CryptoError),

    /// The claim set could not be serialized.
    #[error("serialize claims: {0}")]
    Serialization(String),
}

/// A signed ID token plus its expiry.
#[derive(Debug, Clone)]
pub struct MintedToken {
    /// Compact JWS.
    pub id_token: String,

    /// Expiry of the token, which also bounds the `expires_in` field of
    /// the access-token envelope.
    pub expiry: DateTime<Utc>,
}

/// Builds, signs, and serializes an ID token.
///
/// Cross-client peer trust is re-validated against current storage even
/// though the authorization request already checked it.
///
/// # Errors
///
/// Returns an error if a peer no longer trusts the client, storage fails,
/// or signing fails.
#[allow(clippy::too_many_arguments)]
pub async fn mint_id_token(
    storage: &dyn Storage,
    keys: &Keys,
    issuer: &str,
    client_id: &str,
    identity: &Identity,
    scopes: &[String],
    nonce: &str,
    lifetime: Duration,
) -> Result<MintedToken, TokenError> {
    let now = Utc::now();
    let expiry = now + lifetime;

    let mut claims = IdTokenClaims {
        iss: issuer.to_string(),
        sub: identity.user_id.clone(),
        aud: Audience::default(),
        exp: expiry.timestamp(),
        iat: now.timestamp(),
        azp: None,
        nonce: (!nonce.is_empty()).then(|| nonce.to_string()),
        email: None,
        email_verified: None,
        groups: None,
        name: None,
    };

    for scope in scopes {
        match scope.as_str() {
            SCOPE_EMAIL => {
                claims.email = Some(identity.email.clone());
                claims.email_verified = Some(identity.email_verified);
            }
            SCOPE_GROUPS => {
                if !identity.groups.is_empty() {
                    claims.groups = Some(identity.groups.clone());
                }
            }
            SCOPE_PROFILE => {
                claims.name = Some(identity.username.clone());
            }
            other => {
                let Some(peer_id) = parse_cross_client_scope(other) else {
                    continue;
                };
                let trusted = validate_cross_client_trust(storage, client_id, peer_id)
                    .await
                    .map_err(|()| {
                        TokenError::Storage(StorageError::Internal(
                            "peer trust lookup failed".to_string(),
                        ))
                    })?;
                if !trusted {
                    return Err(TokenError::UntrustedPeer(peer_id.to_string()));
                }
                claims.aud.0.push(peer_id.to_string());
            }
        }
    }

    if claims.aud.0.is_empty() {
        claims.aud.0.push(client_id.to_string());
    } else {
        claims.azp = Some(client_id.to_string());
    }

    let payload =
        serde_json::to_vec(&claims).map_err(|e| TokenError::Serialization(e.to_string()))?;
    let id_token = keys.sign(&payload)?;

    Ok(MintedToken { id_token, expiry })
}
