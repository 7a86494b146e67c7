//! Server configuration.
//!
//! Configuration is loaded from `OXIDP_*` environment variables with
//! sensible defaults. Connector and client provisioning happen outside
//! this module; the server only consumes the resulting registry.

use chrono::Duration;
use oxidp_crypto::SignatureAlgorithm;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// Issuer URL, also the base of every generated URL. No trailing slash.
    pub issuer: String,

    /// Skip the approval screen and issue codes immediately after login.
    pub skip_approval: bool,

    /// Authorization request lifetime in seconds.
    pub auth_request_ttl: i64,

    /// Authorization code lifetime in seconds.
    pub auth_code_ttl: i64,

    /// ID token lifetime in seconds.
    pub id_token_ttl: i64,

    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl: i64,

    /// Signing key rotation period in seconds.
    pub rotation_period: i64,

    /// Algorithm for generated signing keys.
    pub signing_algorithm: SignatureAlgorithm,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `OXIDP_SIGNING_ALG` names an unknown algorithm.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let host = std::env::var("OXIDP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_parsed("OXIDP_PORT", 5556);

        let issuer = std::env::var("OXIDP_ISSUER")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let skip_approval = std::env::var("OXIDP_SKIP_APPROVAL")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let signing_algorithm = match std::env::var("OXIDP_SIGNING_ALG") {
            Ok(alg) => alg
                .parse()
                .map_err(|e| anyhow::anyhow!("OXIDP_SIGNING_ALG: {e}"))?,
            Err(_) => SignatureAlgorithm::Rs256,
        };

        Ok(Self {
            host,
            port,
            issuer,
            skip_approval,
            auth_request_ttl: env_parsed("OXIDP_AUTH_REQUEST_TTL", 86_400),
            auth_code_ttl: env_parsed("OXIDP_AUTH_CODE_TTL", 300),
            id_token_ttl: env_parsed("OXIDP_ID_TOKEN_TTL", 86_400),
            refresh_token_ttl: env_parsed("OXIDP_REFRESH_TOKEN_TTL", 2_592_000),
            rotation_period: env_parsed("OXIDP_ROTATION_PERIOD", 21_600),
            signing_algorithm,
        })
    }

    /// Creates a configuration for tests: loopback issuer, approval
    /// skipped, and a fast signing algorithm.
    #[must_use]
    pub fn for_testing(issuer: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            issuer: issuer.trim_end_matches('/').to_string(),
            skip_approval: true,
            signing_algorithm: SignatureAlgorithm::Es256,
            ..Self::default()
        }
    }

    /// Returns the authorization request lifetime.
    #[must_use]
    pub fn auth_request_duration(&self) -> Duration {
        Duration::seconds(self.auth_request_ttl)
    }

    /// Returns the authorization code lifetime.
    #[must_use]
    pub fn auth_code_duration(&self) -> Duration {
        Duration::seconds(self.auth_code_ttl)
    }

    /// Returns the ID token lifetime.
    #[must_use]
    pub fn id_token_duration(&self) -> Duration {
        Duration::seconds(self.id_token_ttl)
    }

    /// Returns the refresh token lifetime.
    #[must_use]
    pub fn refresh_token_duration(&self) -> Duration {
        Duration::seconds(self.refresh_token_ttl)
    }

    /// Returns the signing key rotation period.
    #[must_use]
    pub fn rotation_duration(&self) -> Duration {
        Duration::seconds(self.rotation_period)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5556,
            issuer: "http://localhost:5556".to_string(),
            skip_approval: false,
            auth_request_ttl: 86_400,
            auth_code_ttl: 300,
            id_token_ttl: 86_400,
            refresh_token_ttl: 2_592_000,
            rotation_period: 21_600,
            signing_algorithm: SignatureAlgorithm::Rs256,
        }
    }
}
