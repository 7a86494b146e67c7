//! HTTP request handlers.

pub mod auth;
pub mod metadata;
pub mod token;

use axum::response::{IntoResponse, Redirect, Response};
use oxidp_oidc::{OAuth2Error, REDIRECT_URI_OOB};
use url::Url;

use crate::templates;

/// Delivers a protocol error to the user agent.
///
/// When the error carries a validated redirect URI, the error is sent back
/// to the client via a redirect with `error`, `error_description`, and
/// `state` parameters; otherwise an error page is rendered. The
/// out-of-band pseudo-URI never receives redirects.
pub fn oauth2_error_response(err: &OAuth2Error) -> Response {
    if let Some(redirect_uri) = err.redirect_uri.as_deref() {
        if redirect_uri != REDIRECT_URI_OOB {
            if let Ok(mut url) = Url::parse(redirect_uri) {
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("error", err.kind.as_str());
                    if !err.description.is_empty() {
                        query.append_pair("error_description", &err.description);
                    }
                    if let Some(state) = err.state.as_deref() {
                        if !state.is_empty() {
                            query.append_pair("state", state);
                        }
                    }
                }
                return Redirect::to(url.as_str()).into_response();
            }
        }
    }
    templates::error_page(err)
}
