//! # oxidp-oidc
//!
//! The OAuth2 / OpenID Connect protocol layer of the oxidp identity
//! provider:
//!
//! - request parsing and validation for the authorization endpoint
//! - the OAuth2 error taxonomy
//! - scope vocabulary, including cross-client audience scopes
//! - ID token claims assembly, audience serialization, and signing
//! - discovery metadata and token-endpoint envelopes
//!
//! The flow state machine itself lives in the server crate; this crate is
//! the pure protocol logic it dispatches to.

#![forbid(unsafe_code)]

pub mod claims;
pub mod discovery;
pub mod error;
pub mod request;
pub mod scopes;
pub mod token;

pub use claims::{mint_id_token, Audience, IdTokenClaims, MintedToken, TokenError};
pub use discovery::Discovery;
pub use error::{ErrorKind, ErrorResponse, OAuth2Error};
pub use request::{
    parse_authorization_request, validate_cross_client_trust, validate_redirect_uri,
    AuthorizationParams, REDIRECT_URI_OOB,
};
pub use token::{GrantType, TokenRequest, TokenResponse};
