//! Protocol record types.
//!
//! These are the persisted shapes of every object the flow state machine
//! touches. The serde names form the canonical wire layout shared by all
//! storage backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serde helpers for byte fields stored as URL-safe base64.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// An OAuth2 client registered with the server.
///
/// Clients are created through the admin surface and never mutated by the
/// authorization flow itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Client identifier presented in `client_id` parameters.
    pub id: String,

    /// Client secret for token-endpoint authentication.
    pub secret: String,

    /// Registered redirect URIs. A non-public client must list every
    /// acceptable URI literally.
    #[serde(rename = "redirectURIs")]
    pub redirect_uris: Vec<String>,

    /// Peers allowed to request ID tokens with this client as audience.
    /// Clients inherently trust themselves.
    pub trusted_peers: Vec<String>,

    /// Public clients accept only the out-of-band redirect or loopback
    /// HTTP URIs instead of registered redirects.
    pub public: bool,

    /// Human-readable name shown on the approval screen.
    pub name: String,

    /// Logo shown on the approval screen.
    #[serde(rename = "logoURL")]
    pub logo_url: String,
}

/// The identity of an end user as reported by a connector.
///
/// Never persisted on its own; always embedded in an [`AuthRequest`],
/// [`AuthCode`], or [`RefreshToken`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable identifier for the user within the connector's backend.
    #[serde(rename = "userID")]
    pub user_id: String,

    /// Username, surfaced as the `name` claim under the `profile` scope.
    pub username: String,

    /// Email address.
    pub email: String,

    /// Whether the upstream backend has verified the email address.
    pub email_verified: bool,

    /// Group memberships, in connector order.
    pub groups: Vec<String>,

    /// Opaque connector state used for subsequent requests after the
    /// initial authentication (e.g. upstream access tokens). Never shared
    /// with end users or clients.
    #[serde(with = "base64_bytes", default)]
    pub connector_data: Vec<u8>,
}

/// An in-progress authorization flow.
///
/// Created by `/auth`, given an identity by the connector callback, and
/// deleted when the code is issued. The record ID doubles as the `state`
/// value threaded through the connector round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Record identifier, a fresh random token.
    pub id: String,

    /// Client that initiated the flow.
    #[serde(rename = "clientID")]
    pub client_id: String,

    /// Requested response types.
    pub response_types: Vec<String>,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// Validated redirect URI.
    #[serde(rename = "redirectURI")]
    pub redirect_uri: String,

    /// Client-supplied nonce to be echoed in the ID token.
    pub nonce: String,

    /// Client-supplied state echoed on the final redirect.
    pub state: String,

    /// The client demanded an approval prompt on every request.
    pub force_approval_prompt: bool,

    /// End-user identity; set together with `connector_id` after the
    /// connector authenticates the user.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub identity: Option<Identity>,

    /// Connector that produced the identity.
    #[serde(rename = "connectorID", skip_serializing_if = "Option::is_none", default)]
    pub connector_id: Option<String>,

    /// Enforced on every read; expired requests are treated as absent.
    pub expiry: DateTime<Utc>,
}

/// A single-use code exchangeable at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCode {
    /// The code value handed to the client.
    pub id: String,

    /// Client the code was issued to.
    #[serde(rename = "clientID")]
    pub client_id: String,

    /// Redirect URI the code was issued against; the token exchange must
    /// present the same value.
    #[serde(rename = "redirectURI")]
    pub redirect_uri: String,

    /// Connector that authenticated the user.
    #[serde(rename = "connectorID")]
    pub connector_id: String,

    /// Nonce from the originating authorization request.
    pub nonce: String,

    /// Scopes granted to the client.
    pub scopes: Vec<String>,

    /// The authenticated identity.
    pub identity: Identity,

    /// At most five minutes after issuance.
    pub expiry: DateTime<Utc>,
}

/// A refresh token, rotated on every use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// The token value. Replaced with a fresh value on each grant.
    #[serde(rename = "refreshToken")]
    pub token: String,

    /// Client the token was issued to.
    #[serde(rename = "clientID")]
    pub client_id: String,

    /// Connector that authenticated the user.
    #[serde(rename = "connectorID")]
    pub connector_id: String,

    /// Scopes of the initial grant. Refresh requests may narrow but never
    /// widen this set.
    pub scopes: Vec<String>,

    /// Nonce from the originating authorization request.
    pub nonce: String,

    /// The authenticated identity.
    pub identity: Identity,

    /// Expiry of the token.
    pub expiry: DateTime<Utc>,
}

/// A value which can be claimed exactly once.
///
/// Used by the connector layer to prevent ID token replay when this server
/// is itself a relying party of an upstream OIDC provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nonce {
    /// The nonce value.
    pub value: String,

    /// Expiry of the nonce.
    pub expiry: DateTime<Utc>,
}
