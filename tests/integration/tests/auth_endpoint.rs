//! Authorization endpoint validation scenarios.

use std::collections::HashMap;

use oxidp_integration_tests::TestEnv;

#[tokio::test]
async fn s4_unknown_scope_creates_no_state() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    let response = env
        .http
        .get(env.url(
            "/auth?client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid+pets&state=xyz",
        ))
        .send()
        .await
        .expect("auth request");

    // The redirect URI validated, so the error goes back to the client.
    assert!(response.status().is_redirection());
    let location = response.headers()[reqwest::header::LOCATION]
        .to_str()
        .unwrap();
    let url = url::Url::parse(location).expect("redirect url");
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(params.get("error").map(String::as_str), Some("invalid_scope"));
    assert!(params
        .get("error_description")
        .expect("error description")
        .contains("pets"));
    assert_eq!(params.get("state").map(String::as_str), Some("xyz"));

    // A rejected request must not have persisted an AuthRequest.
    assert_eq!(env.storage.auth_requests_created(), 0);
}

#[tokio::test]
async fn unknown_client_renders_an_error_page() {
    let env = TestEnv::start().await;

    let response = env
        .http
        .get(env.url(
            "/auth?client_id=ghost&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid",
        ))
        .send()
        .await
        .expect("auth request");

    assert_eq!(response.status(), 400);
    let body = response.text().await.expect("body");
    assert!(body.contains("unauthorized_client"));
    assert_eq!(env.storage.auth_requests_created(), 0);
}

#[tokio::test]
async fn valid_request_persists_exactly_one_auth_request() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    let response = env
        .http
        .get(env.url(
            "/auth?client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid",
        ))
        .send()
        .await
        .expect("auth request");

    // Single connector: straight to the connector login.
    assert!(response.status().is_redirection());
    let location = response.headers()[reqwest::header::LOCATION]
        .to_str()
        .unwrap();
    assert!(location.starts_with(&env.url("/auth/mock?state=")));
    assert_eq!(env.storage.auth_requests_created(), 1);
}

#[tokio::test]
async fn unknown_connector_is_not_found() {
    let env = TestEnv::start().await;
    let response = env
        .http
        .get(env.url("/auth/ldap?state=abc"))
        .send()
        .await
        .expect("connector request");
    assert_eq!(response.status(), 404);
}
