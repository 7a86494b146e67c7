//! Conformance suite for storage backends.
//!
//! Any [`Storage`] implementation is expected to pass [`run`]. The suite
//! asserts the contracts the flow state machine depends on: CAS updates,
//! single-use deletes, expired-means-absent reads, and nonce claim
//! semantics.

use chrono::{Duration, Utc};

use crate::storage::Storage;
use crate::types::{AuthCode, AuthRequest, Client, Identity, Nonce, RefreshToken};

fn never_expire() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(365 * 100)
}

fn test_identity() -> Identity {
    Identity {
        user_id: "user-1".to_string(),
        username: "jane".to_string(),
        email: "jane@example.com".to_string(),
        email_verified: true,
        groups: vec!["eng".to_string()],
        connector_data: b"upstream-token".to_vec(),
    }
}

/// Runs every conformance check against the given storage.
///
/// # Panics
///
/// Panics on the first violated contract.
pub async fn run(s: &dyn Storage) {
    auth_request_update(s).await;
    auth_code_single_use(s).await;
    refresh_lifecycle(s).await;
    nonce_claim_semantics(s).await;
    expired_records_are_absent(s).await;
    client_crud(s).await;
}

/// CAS update on an auth request is observed by a subsequent get.
async fn auth_request_update(s: &dyn Storage) {
    let req = AuthRequest {
        id: oxidp_crypto::new_token_id(),
        client_id: "client-1".to_string(),
        response_types: vec!["code".to_string()],
        scopes: vec!["openid".to_string(), "email".to_string()],
        redirect_uri: "https://app.example.com/callback".to_string(),
        nonce: String::new(),
        state: "client-state".to_string(),
        force_approval_prompt: false,
        identity: None,
        connector_id: None,
        expiry: never_expire(),
    };
    let id = req.id.clone();
    s.create_auth_request(req).await.expect("create auth request");

    let identity = test_identity();
    let update_identity = identity.clone();
    s.update_auth_request(
        &id,
        Box::new(move |mut req| {
            req.identity = Some(update_identity);
            req.connector_id = Some("mock".to_string());
            Ok(req)
        }),
    )
    .await
    .expect("update auth request");

    let got = s.get_auth_request(&id).await.expect("get auth request");
    assert_eq!(got.identity, Some(identity), "update not observed");
    assert_eq!(got.connector_id.as_deref(), Some("mock"));

    s.delete_auth_request(&id).await.expect("delete auth request");
    assert!(
        s.get_auth_request(&id).await.unwrap_err().is_not_found(),
        "deleted auth request still readable"
    );
}

/// The first delete of an auth code wins; the second observes NotFound.
async fn auth_code_single_use(s: &dyn Storage) {
    let code = AuthCode {
        id: oxidp_crypto::new_token_id(),
        client_id: "client-1".to_string(),
        redirect_uri: "https://app.example.com/callback".to_string(),
        connector_id: "mock".to_string(),
        nonce: String::new(),
        scopes: vec!["openid".to_string()],
        identity: test_identity(),
        expiry: Utc::now() + Duration::minutes(5),
    };
    let id = code.id.clone();
    s.create_auth_code(code.clone()).await.expect("create auth code");

    assert!(
        s.create_auth_code(code).await.unwrap_err().is_already_exists(),
        "duplicate auth code accepted"
    );

    let got = s.get_auth_code(&id).await.expect("get auth code");
    assert_eq!(got.client_id, "client-1");

    s.delete_auth_code(&id).await.expect("first delete");
    assert!(
        s.delete_auth_code(&id).await.unwrap_err().is_not_found(),
        "second delete of auth code succeeded"
    );
    assert!(s.get_auth_code(&id).await.unwrap_err().is_not_found());
}

/// Refresh tokens are readable until deleted, then gone.
async fn refresh_lifecycle(s: &dyn Storage) {
    let refresh = RefreshToken {
        token: oxidp_crypto::new_token_id(),
        client_id: "client-1".to_string(),
        connector_id: "mock".to_string(),
        scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
        nonce: String::new(),
        identity: test_identity(),
        expiry: never_expire(),
    };
    let token = refresh.token.clone();
    s.create_refresh(refresh.clone()).await.expect("create refresh");

    let got = s.get_refresh(&token).await.expect("get refresh");
    assert_eq!(got, refresh, "refresh token did not round trip");

    let listed = s.list_refresh_tokens().await.expect("list refresh tokens");
    assert!(listed.iter().any(|r| r.token == token));

    s.delete_refresh(&token).await.expect("delete refresh");
    assert!(
        s.get_refresh(&token).await.unwrap_err().is_not_found(),
        "deleted refresh token still readable"
    );
}

/// Creating an existing nonce fails; claiming works exactly once.
async fn nonce_claim_semantics(s: &dyn Storage) {
    let value = oxidp_crypto::new_token_id();
    let nonce = Nonce {
        value: value.clone(),
        expiry: Utc::now() + Duration::minutes(10),
    };
    s.create_nonce(nonce.clone()).await.expect("create nonce");

    assert!(
        s.create_nonce(nonce).await.unwrap_err().is_already_exists(),
        "duplicate nonce accepted"
    );

    s.delete_nonce(&value).await.expect("first claim");
    assert!(
        s.delete_nonce(&value).await.unwrap_err().is_not_found(),
        "nonce claimed twice"
    );
}

/// Expired records read as NotFound even before garbage collection runs.
async fn expired_records_are_absent(s: &dyn Storage) {
    let past = Utc::now() - Duration::minutes(1);

    let req_id = oxidp_crypto::new_token_id();
    s.create_auth_request(AuthRequest {
        id: req_id.clone(),
        client_id: "client-1".to_string(),
        response_types: vec!["code".to_string()],
        scopes: vec!["openid".to_string()],
        redirect_uri: "https://app.example.com/callback".to_string(),
        nonce: String::new(),
        state: String::new(),
        force_approval_prompt: false,
        identity: None,
        connector_id: None,
        expiry: past,
    })
    .await
    .expect("create expired auth request");
    assert!(
        s.get_auth_request(&req_id).await.unwrap_err().is_not_found(),
        "expired auth request readable"
    );

    let code_id = oxidp_crypto::new_token_id();
    s.create_auth_code(AuthCode {
        id: code_id.clone(),
        client_id: "client-1".to_string(),
        redirect_uri: "https://app.example.com/callback".to_string(),
        connector_id: "mock".to_string(),
        nonce: String::new(),
        scopes: vec!["openid".to_string()],
        identity: test_identity(),
        expiry: past,
    })
    .await
    .expect("create expired auth code");
    assert!(
        s.get_auth_code(&code_id).await.unwrap_err().is_not_found(),
        "expired auth code readable"
    );
}

/// Clients support create, get, CAS update, list, and delete.
async fn client_crud(s: &dyn Storage) {
    let id = format!("client-{}", oxidp_crypto::new_token_id());
    let client = Client {
        id: id.clone(),
        secret: "secret".to_string(),
        redirect_uris: vec!["https://app.example.com/callback".to_string()],
        trusted_peers: Vec::new(),
        public: false,
        name: "Example".to_string(),
        logo_url: String::new(),
    };
    s.create_client(client.clone()).await.expect("create client");
    assert!(
        s.create_client(client).await.unwrap_err().is_already_exists(),
        "duplicate client accepted"
    );

    s.update_client(
        &id,
        Box::new(|mut c| {
            c.trusted_peers.push("peer-1".to_string());
            Ok(c)
        }),
    )
    .await
    .expect("update client");

    let got = s.get_client(&id).await.expect("get client");
    assert_eq!(got.trusted_peers, vec!["peer-1".to_string()]);

    let listed = s.list_clients().await.expect("list clients");
    assert!(listed.iter().any(|c| c.id == id));

    s.delete_client(&id).await.expect("delete client");
    assert!(s.get_client(&id).await.unwrap_err().is_not_found());
}
