//! OAuth2 / OIDC error taxonomy.
//!
//! Protocol errors carry a deterministic error code, a human description,
//! and, when validation got far enough to trust it, the redirect URI so
//! redirect-based error responses remain possible.

use serde::{Deserialize, Serialize};

/// OAuth2 error codes, as defined by RFC 6749 and OpenID Connect Core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or otherwise invalid request.
    InvalidRequest,
    /// The client may not use this flow.
    UnauthorizedClient,
    /// The resource owner denied the request.
    AccessDenied,
    /// The response type is not supported.
    UnsupportedResponseType,
    /// A requested scope is invalid or unknown.
    InvalidScope,
    /// An internal fault. Descriptions are never sent to clients.
    ServerError,
    /// The server is temporarily unable to handle the request.
    TemporarilyUnavailable,
    /// The grant type is not supported.
    UnsupportedGrantType,
    /// The grant (code, refresh token) is invalid.
    InvalidGrant,
    /// Client authentication failed.
    InvalidClient,
}

impl ErrorKind {
    /// Returns the wire error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidClient => "invalid_client",
        }
    }

    /// Returns the HTTP status for token-endpoint responses.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::ServerError => 500,
            Self::TemporarilyUnavailable => 503,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol error raised while handling an OAuth2 request.
#[derive(Debug, Clone)]
pub struct OAuth2Error {
    /// The error code.
    pub kind: ErrorKind,
    /// Human-readable description. Empty for server faults.
    pub description: String,
    /// Validated redirect URI, present once validation trusted it. When
    /// set, the error may be delivered by redirect instead of an error
    /// page.
    pub redirect_uri: Option<String>,
    /// Client state to echo on a redirect delivery.
    pub state: Option<String>,
}

impl OAuth2Error {
    /// Creates an error delivered directly (no redirect available).
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            redirect_uri: None,
            state: None,
        }
    }

    /// Creates an internal fault with no client-visible description.
    #[must_use]
    pub fn server_error() -> Self {
        Self::new(ErrorKind::ServerError, "")
    }

    /// Attaches a validated redirect URI and the client state, enabling
    /// redirect delivery.
    #[must_use]
    pub fn with_redirect(mut self, redirect_uri: impl Into<String>, state: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self.state = Some(state.into());
        self
    }

    /// Converts into the JSON body used by the token endpoint.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.kind.as_str().to_string(),
            error_description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
        }
    }
}

impl std::fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            f.write_str(self.kind.as_str())
        } else {
            write!(f, "{}: {}", self.kind.as_str(), self.description)
        }
    }
}

impl std::error::Error for OAuth2Error {}

/// JSON error body for the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}
