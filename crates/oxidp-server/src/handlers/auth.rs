//! Authorization flow handlers.
//!
//! The multi-step flow threading an authorization request from `/auth`
//! through a connector and the approval step to code issuance. The `state`
//! parameter carried through every step is the `AuthRequest` record ID, so
//! it both resists CSRF and identifies the in-progress request.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use oxidp_connector::{Connector, PasswordLogin};
use oxidp_oidc::{
    parse_authorization_request, AuthorizationParams, ErrorKind, OAuth2Error, REDIRECT_URI_OOB,
};
use oxidp_storage::{AuthCode, AuthRequest, Identity};
use serde::Deserialize;
use url::Url;

use super::oauth2_error_response;
use crate::state::AppState;
use crate::templates::{
    self, ApprovalTemplate, ConnectorEntry, OobTemplate, PasswordTemplate, PickerTemplate,
};

/// Query parameters carrying only the flow state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateQuery {
    /// The flow state (the `AuthRequest` ID).
    #[serde(default)]
    pub state: String,
}

/// Password form submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordForm {
    /// Submitted username.
    #[serde(default)]
    pub username: String,
    /// Submitted password.
    #[serde(default)]
    pub password: String,
    /// Flow state from the hidden form field.
    #[serde(default)]
    pub state: String,
}

/// Approval form submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalForm {
    /// `approve` grants access; anything else denies.
    #[serde(default)]
    pub approval: String,
    /// Flow state from the hidden form field.
    #[serde(default)]
    pub state: String,
}

fn server_error_page() -> Response {
    oauth2_error_response(&OAuth2Error::server_error())
}

/// `GET /auth`
///
/// Parses and validates the authorization request, persists it, and routes
/// the user to a connector. A request that fails validation creates no
/// storage state.
pub async fn authorization(
    State(app): State<AppState>,
    Query(params): Query<AuthorizationParams>,
) -> Response {
    let auth_req = match parse_authorization_request(
        app.storage.as_ref(),
        &params,
        app.config.auth_request_duration(),
    )
    .await
    {
        Ok(auth_req) => auth_req,
        Err(err) => return oauth2_error_response(&err),
    };

    let state = auth_req.id.clone();
    if let Err(err) = app.storage.create_auth_request(auth_req).await {
        tracing::error!(error = %err, "failed to create authorization request");
        return server_error_page();
    }

    // With a single connector there is nothing to pick.
    if app.connectors.len() == 1 {
        if let Some(id) = app.connectors.keys().next() {
            return Redirect::to(&connector_url(&app, id, &state)).into_response();
        }
    }

    let connectors = app
        .connectors
        .keys()
        .map(|id| ConnectorEntry {
            display_name: id.clone(),
            url: connector_url(&app, id, &state),
        })
        .collect();
    templates::render(&PickerTemplate { connectors }, StatusCode::OK)
}

fn connector_url(app: &AppState, connector_id: &str, state: &str) -> String {
    format!(
        "{}?state={}",
        app.abs_url(&format!("/auth/{connector_id}")),
        urlencoding::encode(state)
    )
}

/// `GET /auth/{connector}`
///
/// Dispatches on the connector's capability: callback connectors redirect
/// to the upstream login URL, password connectors render the login form.
pub async fn connector_login(
    State(app): State<AppState>,
    Path(connector_id): Path<String>,
    Query(query): Query<StateQuery>,
) -> Response {
    let Some(connector) = app.connectors.get(&connector_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(callback) = connector.as_callback() {
        let callback_url = app.abs_url(&format!("/callback/{connector_id}"));
        return match callback.login_url(&callback_url, &query.state) {
            Ok(url) => Redirect::to(&url).into_response(),
            Err(err) => {
                tracing::error!(connector = %connector_id, error = %err, "connector failed to build login URL");
                server_error_page()
            }
        };
    }
    if connector.as_password().is_some() {
        return templates::render(
            &PasswordTemplate {
                post_url: connector_url(&app, &connector_id, &query.state),
                state: query.state,
                error: String::new(),
            },
            StatusCode::OK,
        );
    }
    StatusCode::NOT_FOUND.into_response()
}

/// `POST /auth/{connector}`
///
/// Password form submission. Bad credentials re-render the form; a
/// connector fault is a server error.
pub async fn connector_login_submit(
    State(app): State<AppState>,
    Path(connector_id): Path<String>,
    Query(query): Query<StateQuery>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let Some(connector) = app.connectors.get(&connector_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(password) = connector.as_password() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let state = if form.state.is_empty() {
        query.state
    } else {
        form.state
    };

    let mut identity = match password.login(&form.username, &form.password).await {
        Ok(PasswordLogin::Valid(identity)) => identity,
        Ok(PasswordLogin::InvalidCredentials) => {
            return templates::render(
                &PasswordTemplate {
                    post_url: connector_url(&app, &connector_id, &state),
                    state,
                    error: "Invalid credentials".to_string(),
                },
                StatusCode::OK,
            );
        }
        Err(err) => {
            tracing::error!(connector = %connector_id, error = %err, "failed to login user");
            return server_error_page();
        }
    };

    if let Err(response) =
        resolve_groups(&app, connector.as_ref(), &state, &mut identity).await
    {
        return response;
    }
    redirect_to_approval(&app, identity, &connector_id, &state).await
}

/// `GET /callback/{connector}`
///
/// Handles the upstream provider's response for callback connectors.
pub async fn connector_callback(
    State(app): State<AppState>,
    Path(connector_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(connector) = app.connectors.get(&connector_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(callback) = connector.as_callback() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let outcome = match callback.handle_callback(&params).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(connector = %connector_id, error = %err, "failed to authenticate");
            return server_error_page();
        }
    };

    let mut identity = outcome.identity;
    if let Err(response) =
        resolve_groups(&app, connector.as_ref(), &outcome.state, &mut identity).await
    {
        return response;
    }
    redirect_to_approval(&app, identity, &connector_id, &outcome.state).await
}

/// Fills in group memberships when the originating request asked for the
/// `groups` scope and the connector can resolve them.
async fn resolve_groups(
    app: &AppState,
    connector: &dyn Connector,
    state: &str,
    identity: &mut Identity,
) -> Result<(), Response> {
    let Some(groups) = connector.as_groups() else {
        return Ok(());
    };

    let auth_req = match app.storage.get_auth_request(state).await {
        Ok(auth_req) => auth_req,
        Err(err) => {
            tracing::error!(error = %err, "failed to get auth request for group resolution");
            return Err(server_error_page());
        }
    };
    if !auth_req.scopes.iter().any(|scope| scope == "groups") {
        return Ok(());
    }

    match groups.groups(identity).await {
        Ok(resolved) => {
            identity.groups = resolved;
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve groups");
            Err(server_error_page())
        }
    }
}

/// Bound on compare-and-swap retries before a conflict becomes a fault.
const CAS_RETRIES: usize = 3;

/// Records the authenticated identity on the authorization request, then
/// sends the user to the approval step.
async fn redirect_to_approval(
    app: &AppState,
    identity: Identity,
    connector_id: &str,
    state: &str,
) -> Response {
    let mut update = Ok(());
    for _ in 0..CAS_RETRIES {
        let identity = identity.clone();
        let connector_id = connector_id.to_string();
        update = app
            .storage
            .update_auth_request(
                state,
                Box::new(move |mut auth_req| {
                    auth_req.identity = Some(identity);
                    auth_req.connector_id = Some(connector_id);
                    Ok(auth_req)
                }),
            )
            .await;
        match &update {
            Err(err) if err.is_conflict() => continue,
            _ => break,
        }
    }
    if let Err(err) = update {
        tracing::error!(error = %err, "failed to update auth request with identity");
        return server_error_page();
    }

    let url = format!(
        "{}?state={}",
        app.abs_url("/approval"),
        urlencoding::encode(state)
    );
    Redirect::to(&url).into_response()
}

/// `GET /approval`
///
/// Shows the approval screen, or short-circuits straight to code issuance
/// when approval is configured away and the client did not force a prompt.
pub async fn approval_page(State(app): State<AppState>, Query(query): Query<StateQuery>) -> Response {
    let auth_req = match load_authenticated_request(&app, &query.state).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };

    if app.config.skip_approval && !auth_req.force_approval_prompt {
        return send_code_response(&app, auth_req).await;
    }

    let client = match app.storage.get_client(&auth_req.client_id).await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(client_id = %auth_req.client_id, error = %err, "failed to get client");
            return server_error_page();
        }
    };
    let client_name = if client.name.is_empty() {
        client.id
    } else {
        client.name
    };
    templates::render(
        &ApprovalTemplate {
            client_name,
            scopes: auth_req.scopes.clone(),
            post_url: app.abs_url("/approval"),
            state: auth_req.id,
        },
        StatusCode::OK,
    )
}

/// `POST /approval`
///
/// Issues the code if the user approved, rejects with `access_denied`
/// otherwise.
pub async fn approval_submit(
    State(app): State<AppState>,
    Form(form): Form<ApprovalForm>,
) -> Response {
    let auth_req = match load_authenticated_request(&app, &form.state).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };

    if form.approval != "approve" {
        return oauth2_error_response(&OAuth2Error::new(
            ErrorKind::AccessDenied,
            "Approval rejected.",
        ));
    }
    send_code_response(&app, auth_req).await
}

/// Loads an auth request by state and requires a resolved identity.
async fn load_authenticated_request(
    app: &AppState,
    state: &str,
) -> Result<AuthRequest, Response> {
    let auth_req = match app.storage.get_auth_request(state).await {
        Ok(auth_req) => auth_req,
        Err(err) => {
            tracing::error!(error = %err, "failed to get auth request");
            return Err(server_error_page());
        }
    };
    if auth_req.identity.is_none() {
        tracing::error!("auth request reached approval without an identity");
        return Err(server_error_page());
    }
    Ok(auth_req)
}

/// Consumes the authorization request and issues a single-use code.
///
/// The delete is the atomic step: a `NotFound` here means another tab of
/// the same browser already completed the flow.
async fn send_code_response(app: &AppState, auth_req: AuthRequest) -> Response {
    let now = Utc::now();
    if now >= auth_req.expiry {
        return oauth2_error_response(&OAuth2Error::new(
            ErrorKind::InvalidRequest,
            "Authorization request period has expired.",
        ));
    }

    if let Err(err) = app.storage.delete_auth_request(&auth_req.id).await {
        return if err.is_not_found() {
            oauth2_error_response(&OAuth2Error::new(
                ErrorKind::InvalidRequest,
                "Authorization request has already been completed.",
            ))
        } else {
            tracing::error!(error = %err, "failed to delete authorization request");
            server_error_page()
        };
    }

    let Some(identity) = auth_req.identity else {
        return server_error_page();
    };
    let code = AuthCode {
        id: oxidp_crypto::new_token_id(),
        client_id: auth_req.client_id,
        redirect_uri: auth_req.redirect_uri.clone(),
        connector_id: auth_req.connector_id.unwrap_or_default(),
        nonce: auth_req.nonce,
        scopes: auth_req.scopes,
        identity,
        expiry: now + app.config.auth_code_duration(),
    };
    if let Err(err) = app.storage.create_auth_code(code.clone()).await {
        tracing::error!(error = %err, "failed to create auth code");
        return server_error_page();
    }

    if auth_req.redirect_uri == REDIRECT_URI_OOB {
        return templates::render(&OobTemplate { code: code.id }, StatusCode::OK);
    }

    let Ok(mut url) = Url::parse(&auth_req.redirect_uri) else {
        return oauth2_error_response(&OAuth2Error::new(
            ErrorKind::ServerError,
            "Invalid redirect URI.",
        ));
    };
    url.query_pairs_mut()
        .append_pair("code", &code.id)
        .append_pair("state", &auth_req.state);
    Redirect::to(url.as_str()).into_response()
}
