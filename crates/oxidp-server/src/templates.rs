//! HTML templates for the login, approval, and error pages.
//!
//! The HTML chrome is deliberately minimal; deployments front these pages
//! with their own styling.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use oxidp_oidc::OAuth2Error;

/// One connector entry on the picker page.
#[derive(Debug, Clone)]
pub struct ConnectorEntry {
    /// Display name of the connector.
    pub display_name: String,
    /// Login URL carrying the flow state.
    pub url: String,
}

/// Connector picker, shown when more than one connector is registered.
#[derive(Template)]
#[template(path = "picker.html")]
pub struct PickerTemplate {
    /// Available connectors.
    pub connectors: Vec<ConnectorEntry>,
}

/// Username/password form for password connectors.
#[derive(Template)]
#[template(path = "password.html")]
pub struct PasswordTemplate {
    /// Form action URL, carrying the flow state in its query.
    pub post_url: String,
    /// Flow state, re-posted as a hidden field.
    pub state: String,
    /// Error message shown after a failed attempt; empty when absent.
    pub error: String,
}

/// Approval page asking the user to grant the client access.
#[derive(Template)]
#[template(path = "approval.html")]
pub struct ApprovalTemplate {
    /// Client display name.
    pub client_name: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Form action URL.
    pub post_url: String,
    /// Flow state, re-posted as a hidden field.
    pub state: String,
}

/// Out-of-band code page for clients without a redirect endpoint.
#[derive(Template)]
#[template(path = "oob.html")]
pub struct OobTemplate {
    /// The authorization code.
    pub code: String,
}

/// Generic error page.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    /// OAuth2 error code.
    pub error: String,
    /// Human-readable description; empty when withheld.
    pub description: String,
}

/// Renders a template to an HTML response with the given status.
pub fn render(template: &impl Template, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Renders an OAuth2 error as an HTML error page.
pub fn error_page(err: &OAuth2Error) -> Response {
    let status =
        StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    render(
        &ErrorTemplate {
            error: err.kind.as_str().to_string(),
            description: err.description.clone(),
        },
        status,
    )
}
