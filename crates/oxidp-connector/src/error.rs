//! Connector error types.

use thiserror::Error;

/// Errors from connector operations.
///
/// These are server-side faults. A password connector rejecting bad
/// credentials is not an error; it reports
/// [`crate::PasswordLogin::InvalidCredentials`] instead.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connector configuration is invalid.
    #[error("invalid connector config: {0}")]
    InvalidConfig(String),

    /// No factory is registered for the requested connector type.
    #[error("unknown connector type {0:?}")]
    UnknownType(String),

    /// A factory was registered twice for the same type tag.
    #[error("connector type {0:?} already registered")]
    DuplicateType(String),

    /// The upstream callback response was malformed.
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// The upstream identity backend failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
