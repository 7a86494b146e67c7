//! Router configuration.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, metadata, token};
use crate::state::AppState;

/// Creates the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth", get(auth::authorization))
        .route(
            "/auth/{connector}",
            get(auth::connector_login).post(auth::connector_login_submit),
        )
        .route("/callback/{connector}", get(auth::connector_callback))
        .route(
            "/approval",
            get(auth::approval_page).post(auth::approval_submit),
        )
        .route("/token", post(token::token))
        .route("/keys", get(metadata::keys))
        .route(
            "/.well-known/openid-configuration",
            get(metadata::discovery),
        )
        .route("/health", get(metadata::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
