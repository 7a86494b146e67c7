//! Authorization-code grant scenarios.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oxidp_integration_tests::TestEnv;

fn decode_segment(jws: &str, index: usize) -> serde_json::Value {
    let segment = jws.split('.').nth(index).expect("jws segment");
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).expect("base64 segment"))
        .expect("segment json")
}

async fn exchange_code(
    env: &TestEnv,
    client: (&str, &str),
    code: &str,
    redirect_uri: &str,
) -> reqwest::Response {
    env.http
        .post(env.url("/token"))
        .basic_auth(client.0, Some(client.1))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .expect("token request")
}

#[tokio::test]
async fn s1_happy_path_code_grant() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    let redirect = env
        .run_browser_flow(
            "client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid+email&state=xyz",
        )
        .await;
    assert!(redirect.as_str().starts_with("https://app/cb?"));
    let params: HashMap<String, String> = redirect
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
    let code = params.get("code").expect("code in redirect");

    let response = exchange_code(&env, ("c1", "s1"), code, "https://app/cb").await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("token json");

    assert_eq!(body["token_type"], "bearer");
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(body["expires_in"].as_i64().unwrap() > 0);
    // No offline_access scope, so no refresh token.
    assert!(body.get("refresh_token").is_none());

    let claims = decode_segment(body["id_token"].as_str().unwrap(), 1);
    assert_eq!(claims["iss"], env.base_url);
    assert_eq!(claims["sub"], "0-385-28089-0");
    assert_eq!(claims["aud"], "c1");
    assert_eq!(claims["email"], "kilgore@kilgore.trout");
    assert_eq!(claims["email_verified"], true);
}

#[tokio::test]
async fn s2_code_replay_is_rejected() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    let (code, _) = env
        .obtain_code("client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid&state=xyz")
        .await;

    let first = exchange_code(&env, ("c1", "s1"), &code, "https://app/cb").await;
    assert_eq!(first.status(), 200);

    let replay = exchange_code(&env, ("c1", "s1"), &code, "https://app/cb").await;
    assert_eq!(replay.status(), 400);
    let body: serde_json::Value = replay.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn s3_wrong_redirect_consumes_the_code() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    let (code, _) = env
        .obtain_code("client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid&state=xyz")
        .await;

    let mismatched = exchange_code(&env, ("c1", "s1"), &code, "https://evil/cb").await;
    assert_eq!(mismatched.status(), 400);
    let body: serde_json::Value = mismatched.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_request");

    // The failed exchange burned the code; the correct redirect no longer
    // resurrects it.
    let retry = exchange_code(&env, ("c1", "s1"), &code, "https://app/cb").await;
    assert_eq!(retry.status(), 400);
}

#[tokio::test]
async fn wrong_client_secret_is_unauthorized() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    let (code, _) = env
        .obtain_code("client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid&state=xyz")
        .await;

    let response = exchange_code(&env, ("c1", "wrong"), &code, "https://app/cb").await;
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn unknown_grant_type_is_invalid_grant() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    let response = env
        .http
        .post(env.url("/token"))
        .basic_auth("c1", Some("s1"))
        .form(&[("grant_type", "password")])
        .send()
        .await
        .expect("token request");
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.expect("error json");
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn id_token_verifies_under_advertised_jwks() {
    let env = TestEnv::start().await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    let (code, _) = env
        .obtain_code("client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid&state=xyz")
        .await;
    let response = exchange_code(&env, ("c1", "s1"), &code, "https://app/cb").await;
    let body: serde_json::Value = response.json().await.expect("token json");
    let id_token = body["id_token"].as_str().unwrap();

    let jwks_response = env
        .http
        .get(env.url("/keys"))
        .send()
        .await
        .expect("jwks request");
    let cache_control = jwks_response
        .headers()
        .get(reqwest::header::CACHE_CONTROL)
        .expect("cache-control header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cache_control.contains("max-age="));
    let jwks: serde_json::Value = jwks_response.json().await.expect("jwks json");

    let header = decode_segment(id_token, 0);
    let kid = header["kid"].as_str().unwrap();
    let jwk = jwks["keys"]
        .as_array()
        .unwrap()
        .iter()
        .find(|key| key["kid"] == kid)
        .expect("signing key advertised in JWKS");

    // The testing configuration signs ES256.
    assert_eq!(jwk["alg"], "ES256");
    let decoding_key = jsonwebtoken::DecodingKey::from_ec_components(
        jwk["x"].as_str().unwrap(),
        jwk["y"].as_str().unwrap(),
    )
    .expect("decoding key");
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::ES256);
    validation.set_audience(&["c1"]);

    #[derive(serde::Deserialize)]
    struct Claims {
        sub: String,
    }
    let verified =
        jsonwebtoken::decode::<Claims>(id_token, &decoding_key, &validation).expect("verify");
    assert_eq!(verified.claims.sub, "0-385-28089-0");
}

#[tokio::test]
async fn discovery_document_is_served() {
    let env = TestEnv::start().await;
    let response = env
        .http
        .get(env.url("/.well-known/openid-configuration"))
        .send()
        .await
        .expect("discovery request");
    assert_eq!(response.status(), 200);
    let doc: serde_json::Value = response.json().await.expect("discovery json");

    assert_eq!(doc["issuer"], env.base_url);
    assert_eq!(doc["authorization_endpoint"], env.url("/auth"));
    assert_eq!(doc["token_endpoint"], env.url("/token"));
    assert_eq!(doc["jwks_uri"], env.url("/keys"));
    assert_eq!(doc["response_types_supported"], serde_json::json!(["code"]));
    assert_eq!(doc["subject_types_supported"], serde_json::json!(["public"]));
    assert_eq!(
        doc["token_endpoint_auth_methods_supported"],
        serde_json::json!(["client_secret_basic"])
    );
}
