//! Refresh-token rotation and cross-client audience scenarios.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oxidp_integration_tests::TestEnv;
use oxidp_storage::{Client, Storage};

fn claims_of(jws: &str) -> serde_json::Value {
    let segment = jws.split('.').nth(1).expect("payload segment");
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).expect("base64")).expect("json")
}

async fn token_response(env: &TestEnv, form: &[(&str, &str)]) -> reqwest::Response {
    env.http
        .post(env.url("/token"))
        .basic_auth("c1", Some("s1"))
        .form(form)
        .send()
        .await
        .expect("token request")
}

async fn obtain_tokens(env: &TestEnv, scope: &str) -> serde_json::Value {
    let query = format!(
        "client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope={}&state=xyz",
        scope.replace(' ', "+"),
    );
    let (code, _) = env.obtain_code(&query).await;
    let response = token_response(
        env,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "https://app/cb"),
        ],
    )
    .await;
    assert_eq!(response.status(), 200);
    response.json().await.expect("token json")
}

#[tokio::test]
async fn s6_refresh_rotation_with_scope_narrowing() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    let initial = obtain_tokens(&env, "openid email profile offline_access").await;
    let first_refresh = initial["refresh_token"].as_str().expect("refresh token");
    // The full-scope ID token carries both email and name.
    let claims = claims_of(initial["id_token"].as_str().unwrap());
    assert_eq!(claims["email"], "kilgore@kilgore.trout");
    assert_eq!(claims["name"], "kilgore");

    let refreshed = token_response(
        &env,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", first_refresh),
            ("scope", "openid email"),
        ],
    )
    .await;
    assert_eq!(refreshed.status(), 200);
    let body: serde_json::Value = refreshed.json().await.expect("refresh json");

    // Rotation handed out a fresh token.
    let second_refresh = body["refresh_token"].as_str().expect("rotated token");
    assert_ne!(second_refresh, first_refresh);

    // The narrowed ID token carries email but not name.
    let claims = claims_of(body["id_token"].as_str().unwrap());
    assert_eq!(claims["email"], "kilgore@kilgore.trout");
    assert!(claims.get("name").is_none());

    // The old token was retired by the rotation.
    let replay = token_response(
        &env,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", first_refresh),
        ],
    )
    .await;
    assert_eq!(replay.status(), 400);
    let body: serde_json::Value = replay.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn refresh_cannot_widen_scopes() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    let initial = obtain_tokens(&env, "openid offline_access").await;
    let refresh_token = initial["refresh_token"].as_str().unwrap();

    let widened = token_response(
        &env,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", "openid email"),
        ],
    )
    .await;
    assert_eq!(widened.status(), 400);
    let body: serde_json::Value = widened.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_request");

    // The failed widening did not rotate the token away.
    let narrowed = token_response(
        &env,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", "openid"),
        ],
    )
    .await;
    assert_eq!(narrowed.status(), 200);
}

#[tokio::test]
async fn refresh_from_another_client_is_rejected() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    env.seed_client("c3", "s3", "https://other/cb").await;

    let initial = obtain_tokens(&env, "openid offline_access").await;
    let refresh_token = initial["refresh_token"].as_str().unwrap();

    let stolen = env
        .http
        .post(env.url("/token"))
        .basic_auth("c3", Some("s3"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .expect("token request");
    assert_eq!(stolen.status(), 400);
    let body: serde_json::Value = stolen.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn s5_cross_client_audience() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    env.storage
        .create_client(Client {
            id: "c2".to_string(),
            secret: "s2".to_string(),
            redirect_uris: Vec::new(),
            trusted_peers: vec!["c1".to_string()],
            public: false,
            name: "Peer".to_string(),
            logo_url: String::new(),
        })
        .await
        .expect("seed peer");

    let tokens = obtain_tokens(&env, "openid oauth2:server:client_id:c2").await;
    let claims = claims_of(tokens["id_token"].as_str().unwrap());
    assert_eq!(claims["aud"], serde_json::json!(["c2"]));
    assert_eq!(claims["azp"], "c1");
}
