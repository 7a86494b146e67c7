//! Password-connector and approval-page scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oxidp_connector::mock::MockConnector;
use oxidp_connector::Connector;
use oxidp_integration_tests::{PasswordOnlyConnector, TestEnv};

const AUTH_QUERY: &str =
    "client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid+groups&state=xyz";

async fn password_env() -> TestEnv {
    let connector: Arc<dyn Connector> = Arc::new(PasswordOnlyConnector::new());
    let env = TestEnv::start_with(connector, true).await;
    env.seed_client("c1", "s1", "https://app/cb").await;
    env
}

/// Follows the initial `/auth` redirect to the connector login form,
/// returning the form URL.
async fn login_form_url(env: &TestEnv) -> String {
    let response = env
        .http
        .get(env.url(&format!("/auth?{AUTH_QUERY}")))
        .send()
        .await
        .expect("auth request");
    assert!(response.status().is_redirection());
    response.headers()[reqwest::header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn state_of(url: &str) -> String {
    url::Url::parse(url)
        .expect("url")
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter")
}

#[tokio::test]
async fn password_connector_renders_the_login_form() {
    let env = password_env().await;
    let form_url = login_form_url(&env).await;

    let response = env.http.get(&form_url).send().await.expect("form request");
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("form body");
    assert!(body.contains("name=\"username\""));
    assert!(body.contains("name=\"password\""));
}

#[tokio::test]
async fn wrong_credentials_re_render_the_form() {
    let env = password_env().await;
    let form_url = login_form_url(&env).await;
    let state = state_of(&form_url);

    let response = env
        .http
        .post(&form_url)
        .form(&[
            ("username", "kilgore"),
            ("password", "wrong"),
            ("state", state.as_str()),
        ])
        .send()
        .await
        .expect("login post");
    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("body");
    assert!(body.contains("Invalid credentials"));
}

#[tokio::test]
async fn successful_login_resolves_groups_and_issues_a_code() {
    let env = password_env().await;
    let form_url = login_form_url(&env).await;
    let state = state_of(&form_url);

    // Correct credentials land on the approval step.
    let response = env
        .http
        .post(&form_url)
        .form(&[
            ("username", "kilgore"),
            ("password", "trout"),
            ("state", state.as_str()),
        ])
        .send()
        .await
        .expect("login post");
    assert!(response.status().is_redirection());
    let approval_url = response.headers()[reqwest::header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(approval_url.starts_with(&env.url("/approval?state=")));

    // Approval is skipped, so the next hop carries the code.
    let response = env
        .http
        .get(&approval_url)
        .send()
        .await
        .expect("approval request");
    assert!(response.status().is_redirection());
    let redirect = url::Url::parse(
        response.headers()[reqwest::header::LOCATION]
            .to_str()
            .unwrap(),
    )
    .expect("client redirect");
    let params: HashMap<String, String> = redirect
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let code = params.get("code").expect("code");

    // The groups scope pulled memberships from the connector.
    let token = env
        .http
        .post(env.url("/token"))
        .basic_auth("c1", Some("s1"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", "https://app/cb"),
        ])
        .send()
        .await
        .expect("token request");
    assert_eq!(token.status(), 200);
    let body: serde_json::Value = token.json().await.expect("token json");
    let payload = body["id_token"].as_str().unwrap().split('.').nth(1).unwrap();
    let claims: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
    assert_eq!(claims["groups"], serde_json::json!(["authors"]));
}

#[tokio::test]
async fn approval_page_is_shown_and_denial_is_access_denied() {
    let connector: Arc<dyn Connector> = Arc::new(MockConnector::with_defaults());
    let env = TestEnv::start_with(connector, false).await;
    env.seed_client("c1", "s1", "https://app/cb").await;

    // Walk the flow to the approval page.
    let mut next = env.url(&format!("/auth?{AUTH_QUERY}"));
    loop {
        let response = env.http.get(&next).send().await.expect("flow request");
        assert!(response.status().is_redirection());
        next = response.headers()[reqwest::header::LOCATION]
            .to_str()
            .unwrap()
            .to_string();
        if next.starts_with(&env.url("/approval")) {
            break;
        }
    }
    let state = state_of(&next);

    let page = env.http.get(&next).send().await.expect("approval page");
    assert_eq!(page.status(), 200);
    let body = page.text().await.expect("body");
    assert!(body.contains("would like to access your account"));
    assert!(body.contains("value=\"approve\""));

    // Denial surfaces access_denied and leaves no code behind.
    let denied = env
        .http
        .post(env.url("/approval"))
        .form(&[("approval", "reject"), ("state", state.as_str())])
        .send()
        .await
        .expect("denial post");
    assert_eq!(denied.status(), 400);
    let body = denied.text().await.expect("body");
    assert!(body.contains("access_denied"));

    // Approving afterwards still works; the request was not consumed.
    let approved = env
        .http
        .post(env.url("/approval"))
        .form(&[("approval", "approve"), ("state", state.as_str())])
        .send()
        .await
        .expect("approval post");
    assert!(approved.status().is_redirection());
    let location = approved.headers()[reqwest::header::LOCATION]
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://app/cb?"));
    assert!(location.contains("code="));
}
