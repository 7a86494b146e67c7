//! Token endpoint request and response envelopes.

use serde::{Deserialize, Serialize};

/// Grant types the token endpoint dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Exchange of a single-use authorization code.
    AuthorizationCode,
    /// Rotation of a refresh token.
    RefreshToken,
}

impl GrantType {
    /// Parses the wire value of `grant_type`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// Form body of a `POST /token` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// The grant type.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code, for the code grant.
    #[serde(default)]
    pub code: String,

    /// Redirect URI the code was issued against.
    #[serde(default)]
    pub redirect_uri: String,

    /// Refresh token, for the refresh grant.
    #[serde(default)]
    pub refresh_token: String,

    /// Optional narrowed scopes for the refresh grant.
    #[serde(default)]
    pub scope: String,

    /// Client ID, when not using HTTP Basic auth.
    #[serde(default)]
    pub client_id: String,

    /// Client secret, when not using HTTP Basic auth.
    #[serde(default)]
    pub client_secret: String,
}

/// JSON body of a successful token response.
///
/// The access token is an opaque random value; this server does not
/// currently honor it at a userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque access token.
    pub access_token: String,

    /// Always `bearer`.
    pub token_type: String,

    /// Seconds until the ID token expires.
    pub expires_in: i64,

    /// New refresh token, when `offline_access` was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The signed ID token.
    pub id_token: String,
}

impl TokenResponse {
    /// Builds the envelope around a freshly minted ID token.
    #[must_use]
    pub fn new(id_token: String, expires_in: i64, refresh_token: Option<String>) -> Self {
        Self {
            access_token: oxidp_crypto::new_token_id(),
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token,
            id_token,
        }
    }
}
