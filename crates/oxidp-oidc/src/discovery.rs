//! OpenID Connect discovery metadata.
//!
//! The document served at `/.well-known/openid-configuration`. All values
//! are static for a given issuer; the advertised signing algorithm follows
//! the configured signing key type.

use oxidp_crypto::SignatureAlgorithm;
use serde::{Deserialize, Serialize};

/// OpenID Provider metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    /// Issuer identifier.
    pub issuer: String,

    /// URL of the authorization endpoint.
    pub authorization_endpoint: String,

    /// URL of the token endpoint.
    pub token_endpoint: String,

    /// URL of the JSON Web Key Set.
    pub jwks_uri: String,

    /// Supported response types.
    pub response_types_supported: Vec<String>,

    /// Supported subject identifier types.
    pub subject_types_supported: Vec<String>,

    /// Supported ID token signing algorithms.
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// Supported scopes.
    pub scopes_supported: Vec<String>,

    /// Supported token endpoint client authentication methods.
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Claims the server may issue.
    pub claims_supported: Vec<String>,
}

impl Discovery {
    /// Builds the metadata document for an issuer.
    ///
    /// `issuer` must not carry a trailing slash; endpoint URLs are formed
    /// by appending the well-known paths.
    #[must_use]
    pub fn for_issuer(issuer: &str, algorithm: SignatureAlgorithm) -> Self {
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/auth"),
            token_endpoint: format!("{issuer}/token"),
            jwks_uri: format!("{issuer}/keys"),
            response_types_supported: vec!["code".to_string()],
            subject_types_supported: vec!["public".to_string()],
            id_token_signing_alg_values_supported: vec![algorithm.jwa_name().to_string()],
            scopes_supported: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            token_endpoint_auth_methods_supported: vec!["client_secret_basic".to_string()],
            claims_supported: vec![
                "aud".to_string(),
                "azp".to_string(),
                "email".to_string(),
                "email_verified".to_string(),
                "exp".to_string(),
                "groups".to_string(),
                "iat".to_string(),
                "iss".to_string(),
                "name".to_string(),
                "sub".to_string(),
            ],
        }
    }
}
