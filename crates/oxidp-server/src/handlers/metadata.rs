//! Discovery and JWKS endpoints.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use oxidp_crypto::JsonWebKeySet;
use oxidp_oidc::Discovery;
use serde::Serialize;

use crate::state::AppState;

/// `GET /.well-known/openid-configuration`
pub async fn discovery(State(app): State<AppState>) -> Response {
    let document = Discovery::for_issuer(app.issuer(), app.config.signing_algorithm);
    Json(document).into_response()
}

/// `GET /keys`
///
/// Serves the public signing key plus every still-valid historical
/// verification key. `Cache-Control` bounds client caches by the next
/// rotation, with a two minute floor.
pub async fn keys(State(app): State<AppState>) -> Response {
    let keys = match app.keys.get().await {
        Ok(keys) => keys,
        Err(err) => {
            tracing::error!(error = %err, "failed to get keys");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };
    let Some(signing_key_pub) = keys.signing_key_pub else {
        tracing::error!("no public signing key found");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
    };

    let now = Utc::now();
    let mut set = Vec::with_capacity(keys.verification_keys.len() + 1);
    set.push(signing_key_pub);
    set.extend(
        keys.verification_keys
            .into_iter()
            .filter(|key| key.expiry > now)
            .map(|key| key.public_key),
    );
    let jwks = JsonWebKeySet::with_keys(set);

    let max_age = std::cmp::max(keys.next_rotation - now, Duration::minutes(2));
    let cache_control = format!("max-age={}, must-revalidate", max_age.num_seconds());
    ([(header::CACHE_CONTROL, cache_control)], Json(jwks)).into_response()
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Static status marker.
    pub status: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
