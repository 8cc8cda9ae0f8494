//! Client configuration

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix, e.g. `SALON_BASE_URL` or `SALON_RETRY__SERVER_RETRIES`
pub const ENV_PREFIX: &str = "SALON";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which part of the site the hosting application is; decides the login route
/// announced when a session cannot be renewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Admin,
    #[default]
    Customer,
}

impl Surface {
    /// Login route for this surface
    pub const fn login_route(self) -> &'static str {
        match self {
            Self::Admin => "/admin/login",
            Self::Customer => "/login",
        }
    }
}

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root for all relative request paths
    pub base_url: String,

    /// Timeout applied to requests that carry none, in seconds
    pub timeout_secs: u64,

    /// Timeout of the refresh-token call, in seconds
    pub refresh_timeout_secs: u64,

    /// Timeout of mutating admin calls, in seconds
    pub admin_timeout_secs: u64,

    /// Refresh endpoint path
    pub refresh_path: String,

    /// Login endpoint path
    pub login_path: String,

    /// Query parameter carrying the cache-busting timestamp on GET requests
    pub cache_bust_param: String,

    /// Admin dashboard or customer site
    pub surface: Surface,

    /// User agent sent with every request
    pub user_agent: String,

    /// Retry behaviour
    pub retry: RetryConfig,

    /// Credential persistence
    pub storage: StorageConfig,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after a failure with no response
    pub network_retries: u32,

    /// Network retry delay is `2^attempt` times this many milliseconds
    pub network_base_ms: u64,

    /// Retries after a retryable server status
    pub server_retries: u32,

    /// Server retry delay is `attempt` times this many milliseconds
    pub server_step_ms: u64,

    /// Statuses eligible for server retries
    pub retry_statuses: Vec<u16>,
}

/// Credential storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Credential file; the platform data directory when unset
    pub path: Option<PathBuf>,

    /// Key holding the JSON-encoded access token
    pub token_key: String,

    /// Key holding the role string
    pub role_key: String,

    /// Key holding cookies set by the backend
    pub cookie_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            refresh_timeout_secs: 10,
            admin_timeout_secs: 15,
            refresh_path: "/api/v1/auth/refresh-token".to_string(),
            login_path: "/api/v1/auth/login".to_string(),
            cache_bust_param: "_t".to_string(),
            surface: Surface::default(),
            user_agent: concat!("salon-client/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            network_retries: 1,
            network_base_ms: 1000,
            server_retries: 2,
            server_step_ms: 1000,
            retry_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            token_key: "token".to_string(),
            role_key: "role".to_string(),
            cookie_key: "cookies".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration pointing at `base_url`, everything else defaulted
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails validation
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = config::Config::builder().add_source(environment()).build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks serde cannot express
    ///
    /// # Errors
    ///
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.timeout_secs == 0 || self.refresh_timeout_secs == 0 || self.admin_timeout_secs == 0
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }

        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("login_path", &self.login_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }

        if self.cache_bust_param.is_empty() {
            return Err(ConfigError::Invalid("cache_bust_param must not be empty".into()));
        }

        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub const fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub const fn admin_timeout(&self) -> Duration {
        Duration::from_secs(self.admin_timeout_secs)
    }

    /// Resolved credential file location
    pub fn credentials_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.path {
            return path.clone();
        }

        ProjectDirs::from("com", "salon", "salon").map_or_else(
            || PathBuf::from("./credentials.json"),
            |dirs| dirs.data_dir().join("credentials.json"),
        )
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
