//! # oxidp-connector
//!
//! The connector contract: an abstraction over upstream identity backends
//! (LDAP, upstream OAuth2/OIDC providers, mocks).
//!
//! A connector is polymorphic over three optional capabilities, each its own
//! trait. The flow state machine probes capabilities at dispatch time via
//! the accessor methods on [`Connector`] rather than calling nil-able
//! methods on one wide interface:
//!
//! - [`PasswordConnector`]: username/password form login
//! - [`CallbackConnector`]: redirect to the upstream, then handle its
//!   callback
//! - [`GroupsConnector`]: resolve group memberships, consulted only when
//!   the originating request asked for the `groups` scope
//!
//! Connectors are built at startup by type-tag keyed factories
//! ([`ConnectorRegistry`]) and are stateless from the state machine's
//! perspective.

#![forbid(unsafe_code)]

pub mod error;
pub mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oxidp_storage::Identity;

pub use error::{ConnectorError, ConnectorResult};

/// A federated login mechanism.
///
/// Implementations expose at least one of the capability traits through
/// the accessor methods; the defaults report the capability as absent.
pub trait Connector: std::fmt::Debug + Send + Sync {
    /// Returns the password capability, if implemented.
    fn as_password(&self) -> Option<&dyn PasswordConnector> {
        None
    }

    /// Returns the callback capability, if implemented.
    fn as_callback(&self) -> Option<&dyn CallbackConnector> {
        None
    }

    /// Returns the groups capability, if implemented.
    fn as_groups(&self) -> Option<&dyn GroupsConnector> {
        None
    }
}

/// Outcome of a password login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordLogin {
    /// The credentials were valid; the user is authenticated.
    Valid(Identity),
    /// The credentials were wrong. Render the form again; not a fault.
    InvalidCredentials,
}

/// Password-based connectors.
#[async_trait]
pub trait PasswordConnector: Send + Sync {
    /// Attempts to authenticate the user with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns an error only for server-side faults (backend unreachable,
    /// protocol failure). Bad credentials are
    /// [`PasswordLogin::InvalidCredentials`], not an error.
    async fn login(&self, username: &str, password: &str) -> ConnectorResult<PasswordLogin>;
}

/// Result of handling an upstream callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    /// The authenticated identity.
    pub identity: Identity,
    /// The flow state threaded through the upstream round-trip.
    pub state: String,
}

/// Redirect-based connectors.
#[async_trait]
pub trait CallbackConnector: Send + Sync {
    /// Builds the upstream login URL the user is redirected to.
    ///
    /// `callback_url` is where the upstream must send the user back;
    /// `state` identifies the in-progress authorization request and must
    /// come back unchanged in the callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be constructed.
    fn login_url(&self, callback_url: &str, state: &str) -> ConnectorResult<String>;

    /// Parses the upstream's callback request (its query parameters) and
    /// produces the authenticated identity plus the threaded state.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback is malformed or the upstream
    /// rejected the login.
    async fn handle_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> ConnectorResult<CallbackOutcome>;
}

/// Connectors that can resolve group memberships.
#[async_trait]
pub trait GroupsConnector: Send + Sync {
    /// Returns the group names for the given identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend lookup fails.
    async fn groups(&self, identity: &Identity) -> ConnectorResult<Vec<String>>;
}

/// A factory for one connector type.
///
/// Each factory parses its own configuration subtree, so per-connector
/// config is a discriminated union keyed by the registry's type tag.
pub trait ConnectorFactory: Send + Sync {
    /// Builds a connector from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    fn open(&self, config: &serde_json::Value) -> ConnectorResult<Arc<dyn Connector>>;
}

/// Registry mapping connector type tags to factories.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: HashMap<&'static str, Box<dyn ConnectorFactory>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under its type tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is already registered.
    pub fn register(
        &mut self,
        type_tag: &'static str,
        factory: Box<dyn ConnectorFactory>,
    ) -> ConnectorResult<()> {
        if self.factories.contains_key(type_tag) {
            return Err(ConnectorError::DuplicateType(type_tag.to_string()));
        }
        self.factories.insert(type_tag, factory);
        Ok(())
    }

    /// Builds a connector of the given type from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the config is invalid.
    pub fn open(
        &self,
        type_tag: &str,
        config: &serde_json::Value,
    ) -> ConnectorResult<Arc<dyn Connector>> {
        let factory = self
            .factories
            .get(type_tag)
            .ok_or_else(|| ConnectorError::UnknownType(type_tag.to_string()))?;
        factory.open(config)
    }

    /// Lists the registered type tags.
    #[must_use]
    pub fn types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}
