//! Service configuration loaded once from environment variables.
//!
//! Every loader reads through [`mockable::Env`] so tests can inject a
//! `MockEnv`; [`Config::load`] uses the real process environment. Unset or
//! empty variables take documented defaults. Loading never fails; call
//! [`Config::validate`] (or [`validate_config`] for an aggregated report)
//! before serving traffic.

mod auth;
mod database;
mod validation;

pub use auth::AuthConfig;
pub use database::{DatabaseConfig, DatabaseLogLevel};
pub use validation::{ConfigValidator, ValidationError, ValidationErrors, validate_config};

use mockable::{DefaultEnv, Env};
use tracing::{debug, warn};

use crate::utils::env::{get_env, get_env_list};

/// Default listening port.
pub const DEFAULT_PORT: &str = "8000";
/// Default CORS origin.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
/// Default log level name.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default deployment environment.
pub const DEFAULT_ENVIRONMENT: &str = "dev";
/// Default service name.
pub const DEFAULT_SERVICE_NAME: &str = "microservice";
/// Default service version.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";

/// Errors raised while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is empty.
    #[error("{field} is required")]
    Missing { field: &'static str },
    /// A setting is present but unusable.
    #[error("{message}")]
    Invalid { message: String },
    /// The database section failed validation.
    #[error("database config: {0}")]
    Database(#[source] Box<ConfigError>),
    /// The authentication section failed validation.
    #[error("keycloak config: {0}")]
    Auth(#[source] Box<ConfigError>),
    /// Aggregated report from [`validate_config`].
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl ConfigError {
    /// Create an [`ConfigError::Invalid`] with the given message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Coarse log verbosity understood by the logging helpers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    /// Everything, including per-request success lines.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Client errors and anomalies.
    Warn,
    /// Server errors only.
    Error,
}

impl LogLevel {
    /// Parse a level name case-insensitively; unknown names map to `Info`.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Directive for `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listening port as configured (validated separately).
    pub port: String,
    /// CORS origins; never empty after loading.
    pub allowed_origins: Vec<String>,
    /// Postgres settings.
    pub database: DatabaseConfig,
    /// Token verification settings.
    pub auth: AuthConfig,
    /// Raw log level name.
    pub log_level: String,
    /// Deployment environment name.
    pub environment: String,
    /// Service name reported by health endpoints.
    pub service_name: String,
    /// Service version reported by health endpoints.
    pub service_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_owned(),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_owned()],
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            service_name: DEFAULT_SERVICE_NAME.to_owned(),
            service_version: DEFAULT_SERVICE_VERSION.to_owned(),
        }
    }
}

impl Config {
    /// Load from the supplied environment.
    ///
    /// # Examples
    /// ```
    /// use mockable::MockEnv;
    /// use service_commons::config::Config;
    ///
    /// let mut env = MockEnv::new();
    /// env.expect_string().returning(|name| match name {
    ///     "PORT" => Some("9000".to_owned()),
    ///     _ => None,
    /// });
    /// let config = Config::from_env(&env);
    /// assert_eq!(config.port, "9000");
    /// assert_eq!(config.service_name, "microservice");
    /// ```
    pub fn from_env<E: Env>(env: &E) -> Self {
        let config = Self {
            port: get_env(env, "PORT", DEFAULT_PORT),
            allowed_origins: get_env_list(env, "ALLOWED_ORIGINS", &[DEFAULT_ALLOWED_ORIGIN]),
            database: DatabaseConfig::from_env(env),
            auth: AuthConfig::from_env(env),
            log_level: get_env(env, "LOG_LEVEL", DEFAULT_LOG_LEVEL),
            environment: get_env(env, "ENVIRONMENT", DEFAULT_ENVIRONMENT),
            service_name: get_env(env, "SERVICE_NAME", DEFAULT_SERVICE_NAME),
            service_version: get_env(env, "SERVICE_VERSION", DEFAULT_SERVICE_VERSION),
        };
        debug!(
            service = %config.service_name,
            environment = %config.environment,
            port = %config.port,
            "configuration loaded"
        );
        config
    }

    /// Load from the process environment.
    #[must_use]
    pub fn load() -> Self {
        Self::from_env(&DefaultEnv::new())
    }

    /// Load `.env` (when present) into the process environment, then load.
    ///
    /// Variables already set in the environment win over the file.
    #[must_use]
    pub fn load_dotenv() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded environment file"),
            Err(error) if error.not_found() => {}
            Err(error) => warn!(%error, "failed to load environment file"),
        }
        Self::load()
    }

    /// Load from `env`, replacing the service name and version when they
    /// were left at their defaults.
    pub fn from_env_with_service_info<E: Env>(env: &E, name: &str, version: &str) -> Self {
        let mut config = Self::from_env(env);
        config.apply_service_info(name, version);
        config
    }

    /// Process-environment variant of [`Config::from_env_with_service_info`].
    #[must_use]
    pub fn load_with_service_info(name: &str, version: &str) -> Self {
        Self::from_env_with_service_info(&DefaultEnv::new(), name, version)
    }

    /// Overwrite default service identity with caller-supplied values.
    pub fn apply_service_info(&mut self, name: &str, version: &str) {
        if self.service_name == DEFAULT_SERVICE_NAME && !name.is_empty() {
            name.clone_into(&mut self.service_name);
        }
        if self.service_version == DEFAULT_SERVICE_VERSION && !version.is_empty() {
            version.clone_into(&mut self.service_version);
        }
    }

    /// Check required settings and both subsections.
    ///
    /// # Errors
    ///
    /// Returns the first failure: missing `PORT`, missing `SERVICE_NAME`,
    /// then database and authentication errors wrapped with their section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::Missing { field: "PORT" });
        }
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "SERVICE_NAME",
            });
        }
        self.database
            .validate()
            .map_err(|err| ConfigError::Database(Box::new(err)))?;
        self.auth
            .validate()
            .map_err(|err| ConfigError::Auth(Box::new(err)))?;
        Ok(())
    }

    /// `dev` or `development`.
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self.environment.as_str(), "dev" | "development")
    }

    /// `prod` or `production`.
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "prod" | "production")
    }

    /// `staging`.
    #[must_use]
    pub fn is_staging(&self) -> bool {
        self.environment == "staging"
    }

    /// Parsed log level.
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse_lenient(&self.log_level)
    }

    /// Port as a number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the port is not within
    /// `1..=65535`.
    pub fn bind_port(&self) -> Result<u16, ConfigError> {
        self.port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| {
                ConfigError::invalid(format!("PORT must be a valid port number, got '{}'", self.port))
            })
    }
}
