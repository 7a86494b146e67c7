//! Scope and response-type vocabulary.

/// Requests an ID token. Required on every authorization request.
pub const SCOPE_OPENID: &str = "openid";
/// Requests a refresh token.
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";
/// Adds `email` and `email_verified` claims.
pub const SCOPE_EMAIL: &str = "email";
/// Adds the `name` claim.
pub const SCOPE_PROFILE: &str = "profile";
/// Adds the `groups` claim; triggers group resolution at login time.
pub const SCOPE_GROUPS: &str = "groups";
/// Prefix of cross-client audience scopes: `oauth2:server:client_id:PEER`.
pub const SCOPE_CROSS_CLIENT_PREFIX: &str = "oauth2:server:client_id:";

/// Authorization code response type.
pub const RESPONSE_TYPE_CODE: &str = "code";
/// Implicit-flow access token response type. Accepted syntactically.
pub const RESPONSE_TYPE_TOKEN: &str = "token";
/// Implicit-flow ID token response type. Accepted syntactically.
pub const RESPONSE_TYPE_ID_TOKEN: &str = "id_token";

/// Checks whether a response type token is one the server understands.
#[must_use]
pub fn is_valid_response_type(response_type: &str) -> bool {
    matches!(
        response_type,
        RESPONSE_TYPE_CODE | RESPONSE_TYPE_TOKEN | RESPONSE_TYPE_ID_TOKEN
    )
}

/// Extracts the peer client ID from a cross-client audience scope.
///
/// Returns `None` if the scope does not carry the cross-client prefix.
#[must_use]
pub fn parse_cross_client_scope(scope: &str) -> Option<&str> {
    scope.strip_prefix(SCOPE_CROSS_CLIENT_PREFIX)
}

/// Checks whether a scope is one of the plain recognized scopes
/// (everything except `openid` and cross-client scopes).
#[must_use]
pub fn is_plain_scope(scope: &str) -> bool {
    matches!(
        scope,
        SCOPE_OFFLINE_ACCESS | SCOPE_EMAIL | SCOPE_PROFILE | SCOPE_GROUPS
    )
}
