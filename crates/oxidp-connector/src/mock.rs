//! Mock connector for tests and demo deployments.
//!
//! Implements all three capabilities. The callback path authenticates
//! unconditionally as the configured identity; the password path checks
//! against a fixed username/password pair.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oxidp_storage::Identity;
use serde::Deserialize;

use crate::error::{ConnectorError, ConnectorResult};
use crate::{
    CallbackConnector, CallbackOutcome, Connector, ConnectorFactory, GroupsConnector,
    PasswordConnector, PasswordLogin,
};

/// Configuration for the mock connector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockConfig {
    /// Accepted username for the password capability.
    pub username: String,
    /// Accepted password for the password capability.
    pub password: String,
    /// Identity reported for every successful login.
    pub identity: MockIdentity,
    /// Groups reported by the groups capability.
    pub groups: Vec<String>,
}

/// Identity fields reported by the mock connector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockIdentity {
    /// Reported user ID.
    pub user_id: String,
    /// Reported email.
    pub email: String,
    /// Reported email verification status.
    pub email_verified: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            username: "kilgore".to_string(),
            password: "trout".to_string(),
            identity: MockIdentity::default(),
            groups: vec!["authors".to_string()],
        }
    }
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self {
            user_id: "0-385-28089-0".to_string(),
            email: "kilgore@kilgore.trout".to_string(),
            email_verified: true,
        }
    }
}

/// Factory for the `"mock"` connector type.
pub struct MockFactory;

impl ConnectorFactory for MockFactory {
    fn open(&self, config: &serde_json::Value) -> ConnectorResult<Arc<dyn Connector>> {
        let config: MockConfig = serde_json::from_value(config.clone())
            .map_err(|e| ConnectorError::InvalidConfig(e.to_string()))?;
        Ok(Arc::new(MockConnector::new(config)))
    }
}

/// The mock connector.
#[derive(Debug)]
pub struct MockConnector {
    config: MockConfig,
}

impl MockConnector {
    /// Creates a mock connector from its configuration.
    #[must_use]
    pub const fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Creates a mock connector with default credentials and identity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(MockConfig::default())
    }

    fn identity(&self) -> Identity {
        Identity {
            user_id: self.config.identity.user_id.clone(),
            username: self.config.username.clone(),
            email: self.config.identity.email.clone(),
            email_verified: self.config.identity.email_verified,
            groups: Vec::new(),
            connector_data: Vec::new(),
        }
    }
}

impl Connector for MockConnector {
    fn as_password(&self) -> Option<&dyn PasswordConnector> {
        Some(self)
    }

    fn as_callback(&self) -> Option<&dyn CallbackConnector> {
        Some(self)
    }

    fn as_groups(&self) -> Option<&dyn GroupsConnector> {
        Some(self)
    }
}

#[async_trait]
impl PasswordConnector for MockConnector {
    async fn login(&self, username: &str, password: &str) -> ConnectorResult<PasswordLogin> {
        if username == self.config.username && password == self.config.password {
            Ok(PasswordLogin::Valid(self.identity()))
        } else {
            Ok(PasswordLogin::InvalidCredentials)
        }
    }
}

#[async_trait]
impl CallbackConnector for MockConnector {
    fn login_url(&self, callback_url: &str, state: &str) -> ConnectorResult<String> {
        let mut url = url::Url::parse(callback_url)
            .map_err(|e| ConnectorError::InvalidConfig(format!("callback url: {e}")))?;
        url.query_pairs_mut().append_pair("state", state);
        Ok(url.to_string())
    }

    async fn handle_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> ConnectorResult<CallbackOutcome> {
        let state = params
            .get("state")
            .cloned()
            .ok_or_else(|| ConnectorError::InvalidCallback("missing state".to_string()))?;
        Ok(CallbackOutcome {
            identity: self.identity(),
            state,
        })
    }
}

#[async_trait]
impl GroupsConnector for MockConnector {
    async fn groups(&self, _identity: &Identity) -> ConnectorResult<Vec<String>> {
        Ok(self.config.groups.clone())
    }
}
