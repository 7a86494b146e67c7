//! Token endpoint.
//!
//! `POST /token` authenticates the client, then dispatches on the grant
//! type. The single-use guarantee for codes and the rotation guarantee for
//! refresh tokens both hang on a successful storage delete.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use oxidp_oidc::{
    mint_id_token, ErrorKind, GrantType, OAuth2Error, TokenRequest, TokenResponse,
};
use oxidp_storage::{Client, Keys, RefreshToken};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// `POST /token`
pub async fn token(
    State(app): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    match handle_token(&app, &headers, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &OAuth2Error) -> Response {
    let status =
        StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_response())).into_response()
}

async fn handle_token(
    app: &AppState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuth2Error> {
    let (client_id, client_secret) = client_credentials(headers, request)?;

    let client = match app.storage.get_client(&client_id).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return Err(OAuth2Error::new(
                ErrorKind::InvalidClient,
                "Invalid client credentials.",
            ));
        }
        Err(err) => {
            tracing::error!(%client_id, error = %err, "failed to get client");
            return Err(OAuth2Error::server_error());
        }
    };
    // Constant-time comparison so secret probing cannot time-channel.
    if client
        .secret
        .as_bytes()
        .ct_eq(client_secret.as_bytes())
        .unwrap_u8()
        != 1
    {
        return Err(OAuth2Error::new(
            ErrorKind::InvalidClient,
            "Invalid client credentials.",
        ));
    }

    match GrantType::parse(&request.grant_type) {
        Some(GrantType::AuthorizationCode) => code_grant(app, request, &client).await,
        Some(GrantType::RefreshToken) => refresh_grant(app, request, &client).await,
        None => Err(OAuth2Error::new(
            ErrorKind::InvalidGrant,
            format!("Unknown grant type {:?}", request.grant_type),
        )),
    }
}

/// Extracts client credentials from HTTP Basic auth (RFC 6749 demands the
/// values be URL-encoded there) or from the form body.
fn client_credentials(
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<(String, String), OAuth2Error> {
    if let Some((user, password)) = basic_auth(headers) {
        let client_id = urlencoding::decode(&user).map_err(|_| {
            OAuth2Error::new(ErrorKind::InvalidRequest, "client_id improperly encoded")
        })?;
        let client_secret = urlencoding::decode(&password).map_err(|_| {
            OAuth2Error::new(ErrorKind::InvalidRequest, "client_secret improperly encoded")
        })?;
        return Ok((client_id.into_owned(), client_secret.into_owned()));
    }
    Ok((request.client_id.clone(), request.client_secret.clone()))
}

/// Parses an `Authorization: Basic` header. A malformed header reads as
/// absent, falling back to form credentials.
fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, password) = credentials.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

async fn current_keys(app: &AppState) -> Result<Keys, OAuth2Error> {
    app.keys.get().await.map_err(|err| {
        tracing::error!(error = %err, "failed to get keys");
        OAuth2Error::server_error()
    })
}

/// Authorization-code grant (RFC 6749 §4.1.3).
async fn code_grant(
    app: &AppState,
    request: &TokenRequest,
    client: &Client,
) -> Result<TokenResponse, OAuth2Error> {
    let invalid_code = || {
        OAuth2Error::new(
            ErrorKind::InvalidRequest,
            "Invalid or expired code parameter.",
        )
    };

    let auth_code = match app.storage.get_auth_code(&request.code).await {
        Ok(code) => code,
        Err(err) if err.is_not_found() => return Err(invalid_code()),
        Err(err) => {
            tracing::error!(error = %err, "failed to get auth code");
            return Err(OAuth2Error::server_error());
        }
    };
    if Utc::now() >= auth_code.expiry || auth_code.client_id != client.id {
        return Err(invalid_code());
    }

    if auth_code.redirect_uri != request.redirect_uri {
        // The exchange attempt burns the code either way; a mismatched
        // redirect must not leave it replayable.
        if let Err(err) = app.storage.delete_auth_code(&request.code).await {
            if !err.is_not_found() {
                tracing::error!(error = %err, "failed to delete auth code");
            }
        }
        return Err(OAuth2Error::new(
            ErrorKind::InvalidRequest,
            "redirect_uri did not match URI from initial request.",
        ));
    }

    let keys = current_keys(app).await?;
    let minted = mint_id_token(
        app.storage.as_ref(),
        &keys,
        app.issuer(),
        &client.id,
        &auth_code.identity,
        &auth_code.scopes,
        &auth_code.nonce,
        app.config.id_token_duration(),
    )
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "failed to create ID token");
        OAuth2Error::server_error()
    })?;

    // Single-use enforcement: only the caller that wins this delete may
    // answer with tokens.
    if let Err(err) = app.storage.delete_auth_code(&request.code).await {
        return if err.is_not_found() {
            Err(invalid_code())
        } else {
            tracing::error!(error = %err, "failed to delete auth code");
            Err(OAuth2Error::server_error())
        };
    }

    let mut refresh_token = None;
    if auth_code.scopes.iter().any(|s| s == "offline_access") {
        let refresh = RefreshToken {
            token: oxidp_crypto::new_token_id(),
            client_id: auth_code.client_id.clone(),
            connector_id: auth_code.connector_id.clone(),
            scopes: auth_code.scopes.clone(),
            nonce: auth_code.nonce.clone(),
            identity: auth_code.identity.clone(),
            expiry: Utc::now() + app.config.refresh_token_duration(),
        };
        if let Err(err) = app.storage.create_refresh(refresh.clone()).await {
            tracing::error!(error = %err, "failed to create refresh token");
            return Err(OAuth2Error::server_error());
        }
        refresh_token = Some(refresh.token);
    }

    let expires_in = (minted.expiry - Utc::now()).num_seconds();
    Ok(TokenResponse::new(minted.id_token, expires_in, refresh_token))
}

/// Refresh-token grant (RFC 6749 §6), with rotation.
async fn refresh_grant(
    app: &AppState,
    request: &TokenRequest,
    client: &Client,
) -> Result<TokenResponse, OAuth2Error> {
    if request.refresh_token.is_empty() {
        return Err(OAuth2Error::new(
            ErrorKind::InvalidRequest,
            "No refresh token in request.",
        ));
    }
    let invalid_token = || {
        OAuth2Error::new(
            ErrorKind::InvalidRequest,
            "Refresh token is invalid or has already been claimed by another client.",
        )
    };

    let refresh = match app.storage.get_refresh(&request.refresh_token).await {
        Ok(refresh) => refresh,
        Err(err) if err.is_not_found() => return Err(invalid_token()),
        Err(err) => {
            tracing::error!(error = %err, "failed to get refresh token");
            return Err(OAuth2Error::server_error());
        }
    };
    if refresh.client_id != client.id {
        return Err(invalid_token());
    }

    // Scope monotonicity: a refresh may narrow the grant, never widen it.
    let mut scopes = refresh.scopes.clone();
    if !request.scope.is_empty() {
        let requested: Vec<String> = request
            .scope
            .split_whitespace()
            .map(String::from)
            .collect();
        let subset = requested
            .iter()
            .all(|scope| refresh.scopes.iter().any(|authorized| authorized == scope));
        if !subset {
            return Err(OAuth2Error::new(
                ErrorKind::InvalidRequest,
                "Requested scopes did not contain authorized scopes.",
            ));
        }
        scopes = requested;
    }

    let keys = current_keys(app).await?;
    let minted = mint_id_token(
        app.storage.as_ref(),
        &keys,
        app.issuer(),
        &client.id,
        &refresh.identity,
        &scopes,
        &refresh.nonce,
        app.config.id_token_duration(),
    )
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "failed to create ID token");
        OAuth2Error::server_error()
    })?;

    // Rotation: retire the presented token, mint a replacement carrying
    // the original scope set.
    if let Err(err) = app.storage.delete_refresh(&request.refresh_token).await {
        return if err.is_not_found() {
            Err(invalid_token())
        } else {
            tracing::error!(error = %err, "failed to delete refresh token");
            Err(OAuth2Error::server_error())
        };
    }
    let rotated = RefreshToken {
        token: oxidp_crypto::new_token_id(),
        expiry: Utc::now() + app.config.refresh_token_duration(),
        ..refresh
    };
    if let Err(err) = app.storage.create_refresh(rotated.clone()).await {
        tracing::error!(error = %err, "failed to create refresh token");
        return Err(OAuth2Error::server_error());
    }

    let expires_in = (minted.expiry - Utc::now()).num_seconds();
    Ok(TokenResponse::new(
        minted.id_token,
        expires_in,
        Some(rotated.token),
    ))
}
