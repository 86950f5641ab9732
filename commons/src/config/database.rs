//! Postgres connection settings.

use std::time::Duration;

use mockable::Env;
use url::Url;

use super::ConfigError;
use crate::utils::env::{get_env, get_env_parsed};

/// Statement logging verbosity requested for the database layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatabaseLogLevel {
    /// No statement logging.
    #[default]
    Silent,
    /// Failed statements only.
    Error,
    /// Failed and slow statements.
    Warn,
    /// Every statement.
    Info,
}

impl DatabaseLogLevel {
    fn parse_lenient(raw: &str) -> Self {
        match raw {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "info" => Self::Info,
            _ => Self::Silent,
        }
    }
}

/// Postgres settings read from `POSTGRES_*` and `DB_*` variables.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Server host.
    pub host: String,
    /// Server port, kept as text until validated.
    pub port: String,
    /// Role name.
    pub user: String,
    /// Role password.
    pub password: String,
    /// Database name.
    pub database_name: String,
    /// libpq `sslmode`.
    pub ssl_mode: String,
    /// Session time zone.
    pub time_zone: String,
    /// Idle connections kept in the pool.
    pub max_idle_conns: u32,
    /// Pool size ceiling.
    pub max_open_conns: u32,
    /// Raw statement log level.
    pub log_level: String,
    /// Connection attempts before giving up.
    pub max_retries: u32,
    /// Fixed pause between connection attempts.
    pub retry_delay: Duration,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("ssl_mode", &self.ssl_mode)
            .field("time_zone", &self.time_zone)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("max_open_conns", &self.max_open_conns)
            .field("log_level", &self.log_level)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: "5432".to_owned(),
            user: "postgres".to_owned(),
            password: "postgres".to_owned(),
            database_name: "defaultdb".to_owned(),
            ssl_mode: "disable".to_owned(),
            time_zone: "UTC".to_owned(),
            max_idle_conns: 10,
            max_open_conns: 100,
            log_level: "silent".to_owned(),
            max_retries: 3,
            retry_delay: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    /// Load from the supplied environment.
    pub fn from_env<E: Env>(env: &E) -> Self {
        let defaults = Self::default();
        Self {
            host: get_env(env, "POSTGRES_HOST", &defaults.host),
            port: get_env(env, "POSTGRES_PORT", &defaults.port),
            user: get_env(env, "POSTGRES_USER", &defaults.user),
            password: get_env(env, "POSTGRES_PASSWORD", &defaults.password),
            database_name: get_env(env, "POSTGRES_DB", &defaults.database_name),
            ssl_mode: get_env(env, "POSTGRES_SSLMODE", &defaults.ssl_mode),
            time_zone: get_env(env, "POSTGRES_TIMEZONE", &defaults.time_zone),
            max_idle_conns: get_env_parsed(env, "POSTGRES_MAX_IDLE_CONNS", defaults.max_idle_conns),
            max_open_conns: get_env_parsed(env, "POSTGRES_MAX_OPEN_CONNS", defaults.max_open_conns),
            log_level: get_env(env, "POSTGRES_LOG_LEVEL", &defaults.log_level),
            max_retries: get_env_parsed(env, "DB_MAX_RETRIES", defaults.max_retries),
            retry_delay: Duration::from_secs(get_env_parsed(
                env,
                "DB_RETRY_DELAY_SECONDS",
                defaults.retry_delay.as_secs(),
            )),
        }
    }

    /// Check required fields and pool bounds.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "database host",
            });
        }
        if self.port.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "database port",
            });
        }
        if self.port.trim().parse::<u16>().is_err() {
            return Err(ConfigError::invalid(format!(
                "database port must be a number, got '{}'",
                self.port
            )));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "database user",
            });
        }
        if self.password.is_empty() {
            return Err(ConfigError::Missing {
                field: "database password",
            });
        }
        if self.database_name.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "database name",
            });
        }
        if self.max_open_conns > 0 && self.max_idle_conns > self.max_open_conns {
            return Err(ConfigError::invalid(
                "max idle connections cannot exceed max open connections",
            ));
        }
        Ok(())
    }

    /// libpq keyword/value connection string.
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={} TimeZone={}",
            self.host,
            self.port,
            self.user,
            self.password,
            self.database_name,
            self.ssl_mode,
            self.time_zone
        )
    }

    /// `postgres://` URL with percent-encoded credentials, as expected by
    /// the diesel connection managers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the host or port cannot form a
    /// URL.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        let base = format!("postgres://{}:{}", self.host, self.port);
        let mut url = Url::parse(&base)
            .map_err(|err| ConfigError::invalid(format!("invalid database address: {err}")))?;
        url.set_username(&self.user)
            .map_err(|()| ConfigError::invalid("database user cannot be encoded in a URL"))?;
        url.set_password(Some(&self.password))
            .map_err(|()| ConfigError::invalid("database password cannot be encoded in a URL"))?;
        url.set_path(&self.database_name);
        url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);
        Ok(url.into())
    }

    /// Whether TLS was requested.
    #[must_use]
    pub fn is_ssl_enabled(&self) -> bool {
        self.ssl_mode != "disable"
    }

    /// Parsed statement log level; unknown values are silent.
    #[must_use]
    pub fn log_level(&self) -> DatabaseLogLevel {
        DatabaseLogLevel::parse_lenient(&self.log_level)
    }
}
