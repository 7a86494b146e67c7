//! Authorization request parsing and validation.
//!
//! `/auth` query parameters are validated before any storage write: a
//! request that fails validation never creates an `AuthRequest`. Once the
//! redirect URI has been validated against the client, errors carry it so
//! they can be delivered by redirect.

use chrono::{Duration, Utc};
use oxidp_storage::{AuthRequest, Client, Storage};
use serde::Deserialize;
use url::Url;

use crate::error::{ErrorKind, OAuth2Error};
use crate::scopes::{
    is_plain_scope, is_valid_response_type, parse_cross_client_scope, SCOPE_OPENID,
};

/// The out-of-band redirect URI for clients without a redirect endpoint.
pub const REDIRECT_URI_OOB: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Raw `/auth` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationParams {
    /// OAuth2 client identifier.
    #[serde(default)]
    pub client_id: String,

    /// Requested redirect URI.
    #[serde(default)]
    pub redirect_uri: String,

    /// Whitespace-separated scopes.
    #[serde(default)]
    pub scope: String,

    /// Whitespace-separated response types.
    #[serde(default)]
    pub response_type: String,

    /// Opaque client state echoed on the final redirect.
    #[serde(default)]
    pub state: String,

    /// Nonce echoed in the issued ID token.
    #[serde(default)]
    pub nonce: String,

    /// `force` demands an approval prompt on every request.
    #[serde(default)]
    pub approval_prompt: String,
}

/// Validates `/auth` parameters and assembles a fresh [`AuthRequest`].
///
/// The request is **not** persisted; the caller stores it only after this
/// returns `Ok`.
///
/// # Errors
///
/// Returns an [`OAuth2Error`] with a deterministic code. The validated
/// redirect URI is attached once it is known to be safe, so scope and
/// response-type errors can be redirected back to the client.
pub async fn parse_authorization_request(
    storage: &dyn Storage,
    params: &AuthorizationParams,
    ttl: Duration,
) -> Result<AuthRequest, OAuth2Error> {
    let client = match storage.get_client(&params.client_id).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return Err(OAuth2Error::new(
                ErrorKind::UnauthorizedClient,
                format!("Invalid client_id ({:?}).", params.client_id),
            ));
        }
        Err(err) => {
            tracing::error!(client_id = %params.client_id, error = %err, "failed to get client");
            return Err(OAuth2Error::server_error());
        }
    };

    if !validate_redirect_uri(&client, &params.redirect_uri) {
        return Err(OAuth2Error::new(
            ErrorKind::InvalidRequest,
            format!("Unregistered redirect_uri ({:?}).", params.redirect_uri),
        ));
    }

    // From here on the redirect URI is trusted and errors may be redirected.
    let redirected = |kind: ErrorKind, description: String| {
        OAuth2Error::new(kind, description)
            .with_redirect(params.redirect_uri.clone(), params.state.clone())
    };

    let scopes: Vec<String> = params.scope.split_whitespace().map(String::from).collect();

    let mut has_openid = false;
    let mut unrecognized: Vec<&str> = Vec::new();
    let mut untrusted: Vec<&str> = Vec::new();
    for scope in &scopes {
        if scope == SCOPE_OPENID {
            has_openid = true;
        } else if is_plain_scope(scope) {
            // recognized, nothing to validate
        } else if let Some(peer_id) = parse_cross_client_scope(scope) {
            let trusted = validate_cross_client_trust(storage, &client.id, peer_id)
                .await
                .map_err(|()| OAuth2Error::server_error())?;
            if !trusted {
                untrusted.push(scope);
            }
        } else {
            unrecognized.push(scope);
        }
    }

    if !has_openid {
        return Err(redirected(
            ErrorKind::InvalidScope,
            r#"Missing required scope(s) ["openid"]."#.to_string(),
        ));
    }
    if !unrecognized.is_empty() {
        return Err(redirected(
            ErrorKind::InvalidScope,
            format!("Unrecognized scope(s) {unrecognized:?}"),
        ));
    }
    if !untrusted.is_empty() {
        return Err(redirected(
            ErrorKind::InvalidScope,
            format!("Client can't request scope(s) {untrusted:?}"),
        ));
    }

    let response_types: Vec<String> = params
        .response_type
        .split_whitespace()
        .map(String::from)
        .collect();
    for response_type in &response_types {
        if !is_valid_response_type(response_type) {
            return Err(redirected(
                ErrorKind::UnsupportedResponseType,
                format!("Invalid response type {response_type:?}"),
            ));
        }
    }

    Ok(AuthRequest {
        id: oxidp_crypto::new_token_id(),
        client_id: client.id,
        response_types,
        scopes,
        redirect_uri: params.redirect_uri.clone(),
        nonce: params.nonce.clone(),
        state: params.state.clone(),
        force_approval_prompt: params.approval_prompt == "force",
        identity: None,
        connector_id: None,
        expiry: Utc::now() + ttl,
    })
}

/// Validates a redirect URI against the client's registration.
///
/// Non-public clients must register every URI literally. Public clients
/// accept only the out-of-band URI or a loopback HTTP URI
/// (`http://localhost:PORT` or `http://127.0.0.1:PORT`, any port).
#[must_use]
pub fn validate_redirect_uri(client: &Client, redirect_uri: &str) -> bool {
    if !client.public {
        return client.redirect_uris.iter().any(|uri| uri == redirect_uri);
    }

    if redirect_uri == REDIRECT_URI_OOB {
        return true;
    }
    let Ok(url) = Url::parse(redirect_uri) else {
        return false;
    };
    url.scheme() == "http"
        && matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"))
}

/// Checks whether `peer_id` trusts `client_id` to mint tokens with the peer
/// as audience. Clients inherently trust themselves; an unknown peer is
/// simply untrusted.
///
/// # Errors
///
/// Returns `Err(())` on a storage fault, which callers surface as
/// `server_error`; the fault is logged here with both client IDs.
pub async fn validate_cross_client_trust(
    storage: &dyn Storage,
    client_id: &str,
    peer_id: &str,
) -> Result<bool, ()> {
    if peer_id == client_id {
        return Ok(true);
    }
    match storage.get_client(peer_id).await {
        Ok(peer) => Ok(peer.trusted_peers.iter().any(|id| id == client_id)),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => {
            tracing::error!(%client_id, %peer_id, error = %err, "failed to get peer client");
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidp_storage::MemoryStorage;

    fn confidential_client() -> Client {
        Client {
            id: "c1".to_string(),
            secret: "s1".to_string(),
            redirect_uris: vec!["https://app/cb".to_string()],
            trusted_peers: Vec::new(),
            public: false,
            name: "App".to_string(),
            logo_url: String::new(),
        }
    }

    fn public_client() -> Client {
        Client {
            public: true,
            redirect_uris: Vec::new(),
            ..confidential_client()
        }
    }

    async fn storage_with(clients: Vec<Client>) -> MemoryStorage {
        let storage = MemoryStorage::new();
        for client in clients {
            storage.create_client(client).await.unwrap();
        }
        storage
    }

    fn params(scope: &str) -> AuthorizationParams {
        AuthorizationParams {
            client_id: "c1".to_string(),
            redirect_uri: "https://app/cb".to_string(),
            scope: scope.to_string(),
            response_type: "code".to_string(),
            state: "xyz".to_string(),
            nonce: String::new(),
            approval_prompt: String::new(),
        }
    }

    #[tokio::test]
    async fn valid_request_builds_auth_request() {
        let storage = storage_with(vec![confidential_client()]).await;
        let req = parse_authorization_request(&storage, &params("openid email"), Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(req.client_id, "c1");
        assert_eq!(req.scopes, vec!["openid", "email"]);
        assert_eq!(req.state, "xyz");
        assert!(!req.id.is_empty());
        assert!(req.expiry > Utc::now());
        assert!(req.identity.is_none());
    }

    #[tokio::test]
    async fn unknown_client_is_unauthorized() {
        let storage = storage_with(vec![]).await;
        let err = parse_authorization_request(&storage, &params("openid"), Duration::hours(24))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnauthorizedClient);
        assert!(err.redirect_uri.is_none());
    }

    #[tokio::test]
    async fn unregistered_redirect_is_rejected_without_redirect() {
        let storage = storage_with(vec![confidential_client()]).await;
        let mut p = params("openid");
        p.redirect_uri = "https://evil/cb".to_string();
        let err = parse_authorization_request(&storage, &p, Duration::hours(24))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(err.redirect_uri.is_none());
    }

    #[tokio::test]
    async fn missing_openid_scope_is_invalid_scope() {
        let storage = storage_with(vec![confidential_client()]).await;
        let err = parse_authorization_request(&storage, &params("email"), Duration::hours(24))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidScope);
        assert!(err.description.contains("openid"));
    }

    #[tokio::test]
    async fn unknown_scope_names_the_offender() {
        let storage = storage_with(vec![confidential_client()]).await;
        let err = parse_authorization_request(&storage, &params("openid pets"), Duration::hours(24))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidScope);
        assert!(err.description.contains("pets"));
        // Redirect URI was validated first, so the error can be redirected.
        assert_eq!(err.redirect_uri.as_deref(), Some("https://app/cb"));
        assert_eq!(err.state.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn cross_client_scope_requires_peer_trust() {
        let peer = Client {
            id: "c2".to_string(),
            trusted_peers: vec!["c1".to_string()],
            ..confidential_client()
        };
        let storage = storage_with(vec![confidential_client(), peer]).await;

        let req = parse_authorization_request(
            &storage,
            &params("openid oauth2:server:client_id:c2"),
            Duration::hours(24),
        )
        .await
        .unwrap();
        assert!(req.scopes.contains(&"oauth2:server:client_id:c2".to_string()));
    }

    #[tokio::test]
    async fn cross_client_scope_without_trust_is_rejected() {
        let peer = Client {
            id: "c2".to_string(),
            trusted_peers: Vec::new(),
            ..confidential_client()
        };
        let storage = storage_with(vec![confidential_client(), peer]).await;

        let err = parse_authorization_request(
            &storage,
            &params("openid oauth2:server:client_id:c2"),
            Duration::hours(24),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidScope);
        assert!(err.description.contains("oauth2:server:client_id:c2"));
    }

    #[tokio::test]
    async fn cross_client_scope_to_unknown_peer_is_rejected() {
        let storage = storage_with(vec![confidential_client()]).await;
        let err = parse_authorization_request(
            &storage,
            &params("openid oauth2:server:client_id:ghost"),
            Duration::hours(24),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidScope);
    }

    #[tokio::test]
    async fn bad_response_type_is_rejected() {
        let storage = storage_with(vec![confidential_client()]).await;
        let mut p = params("openid");
        p.response_type = "code device_code".to_string();
        let err = parse_authorization_request(&storage, &p, Duration::hours(24))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedResponseType);
        assert!(err.description.contains("device_code"));
    }

    #[test]
    fn confidential_redirects_match_literally() {
        let client = confidential_client();
        assert!(validate_redirect_uri(&client, "https://app/cb"));
        assert!(!validate_redirect_uri(&client, "https://app/cb/"));
        assert!(!validate_redirect_uri(&client, "http://localhost:8000"));
    }

    #[test]
    fn public_clients_accept_loopback_and_oob() {
        let client = public_client();
        assert!(validate_redirect_uri(&client, REDIRECT_URI_OOB));
        assert!(validate_redirect_uri(&client, "http://localhost:8000/cb"));
        assert!(validate_redirect_uri(&client, "http://localhost:65535"));
        assert!(validate_redirect_uri(&client, "http://127.0.0.1:39999/cb"));
        assert!(!validate_redirect_uri(&client, "https://localhost:8000"));
        assert!(!validate_redirect_uri(&client, "http://example.com:8000"));
        assert!(!validate_redirect_uri(&client, "not a url"));
    }
}
