//! Server construction options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;

use super::ServerError;
use crate::config::Config;
use crate::health::{DEFAULT_HEALTH_PATH, HealthCheck, HealthRegistry};
use crate::middleware::CorsSettings;

/// Default metrics endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default time allowed for in-flight requests after a shutdown signal.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Registers the service's own routes.
pub type RouteSetup = Arc<dyn Fn(&mut web::ServiceConfig, &Config) + Send + Sync>;

/// What to build and which standard layers to leave out.
///
/// # Examples
/// ```
/// use actix_web::{HttpResponse, web};
/// use service_commons::server::ServerOptions;
///
/// let options = ServerOptions::new("orders", "1.4.0", |cfg, _config| {
///     cfg.route("/orders", web::get().to(|| async { HttpResponse::Ok().finish() }));
/// })
/// .with_port(9000)
/// .without_cors();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct ServerOptions {
    /// Reported service name.
    pub service_name: String,
    /// Reported service version.
    pub service_version: String,
    /// Route registration callback.
    pub setup_routes: Option<RouteSetup>,
    /// Configuration to use instead of loading from the environment.
    pub config: Option<Config>,
    /// Port overriding `PORT`.
    pub port: Option<u16>,
    /// Skip the access log layer.
    pub disable_logging: bool,
    /// Skip the CORS layer.
    pub disable_cors: bool,
    /// Skip the health routes.
    pub disable_health: bool,
    /// Skip panic recovery.
    pub disable_recovery: bool,
    /// Skip request identifiers.
    pub disable_request_id: bool,
    /// CORS policy replacing the one derived from `ALLOWED_ORIGINS`.
    pub cors: Option<CorsSettings>,
    /// Base path of the health routes; empty means `/health`.
    pub health_path: String,
    /// Path of the metrics endpoint (with the `metrics` feature).
    pub metrics_path: String,
    /// Dependency checks reported by the health routes.
    pub health_checks: HealthRegistry,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            service_version: String::new(),
            setup_routes: None,
            config: None,
            port: None,
            disable_logging: false,
            disable_cors: false,
            disable_health: false,
            disable_recovery: false,
            disable_request_id: false,
            cors: None,
            health_path: DEFAULT_HEALTH_PATH.to_owned(),
            metrics_path: DEFAULT_METRICS_PATH.to_owned(),
            health_checks: HealthRegistry::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .field("has_setup_routes", &self.setup_routes.is_some())
            .field("has_config", &self.config.is_some())
            .field("port", &self.port)
            .field("disable_logging", &self.disable_logging)
            .field("disable_cors", &self.disable_cors)
            .field("disable_health", &self.disable_health)
            .field("disable_recovery", &self.disable_recovery)
            .field("disable_request_id", &self.disable_request_id)
            .field("health_path", &self.health_path)
            .field("metrics_path", &self.metrics_path)
            .field("health_checks", &self.health_checks.len())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl ServerOptions {
    /// Options with every standard layer enabled.
    pub fn new<F>(name: impl Into<String>, version: impl Into<String>, setup_routes: F) -> Self
    where
        F: Fn(&mut web::ServiceConfig, &Config) + Send + Sync + 'static,
    {
        Self {
            service_name: name.into(),
            service_version: version.into(),
            setup_routes: Some(Arc::new(setup_routes)),
            ..Self::default()
        }
    }

    /// Use `config` instead of reading the environment.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Listen on `port` regardless of `PORT`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Replace the CORS policy.
    #[must_use]
    pub fn with_cors(mut self, cors: CorsSettings) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Serve health routes under `path`.
    #[must_use]
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Serve metrics at `path`.
    #[must_use]
    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// Report `check` from the health routes.
    #[must_use]
    pub fn with_health_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.health_checks.register(check);
        self
    }

    /// Grace period for in-flight requests on shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Leave out the access log.
    #[must_use]
    pub fn without_logging(mut self) -> Self {
        self.disable_logging = true;
        self
    }

    /// Leave out CORS handling.
    #[must_use]
    pub fn without_cors(mut self) -> Self {
        self.disable_cors = true;
        self
    }

    /// Leave out the health routes.
    #[must_use]
    pub fn without_health(mut self) -> Self {
        self.disable_health = true;
        self
    }

    /// Leave out panic recovery.
    #[must_use]
    pub fn without_recovery(mut self) -> Self {
        self.disable_recovery = true;
        self
    }

    /// Leave out request identifiers.
    #[must_use]
    pub fn without_request_id(mut self) -> Self {
        self.disable_request_id = true;
        self
    }

    /// Check the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidOptions`] naming the first problem.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.service_name.trim().is_empty() {
            return Err(ServerError::invalid_options("ServiceName is required"));
        }
        if self.service_version.trim().is_empty() {
            return Err(ServerError::invalid_options("ServiceVersion is required"));
        }
        if self.setup_routes.is_none() {
            return Err(ServerError::invalid_options(
                "SetupRoutes function is required",
            ));
        }
        // An empty health path means the default.
        if !self.health_path.is_empty() && !self.health_path.starts_with('/') {
            return Err(ServerError::invalid_options(
                "HealthPath must start with '/'",
            ));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ServerError::invalid_options(
                "MetricsPath must start with '/'",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn noop(_: &mut web::ServiceConfig, _: &Config) {}

    #[rstest]
    fn defaults_enable_everything() {
        let options = ServerOptions::new("svc", "1.0.0", noop);
        assert!(!options.disable_logging);
        assert!(!options.disable_cors);
        assert!(!options.disable_health);
        assert!(!options.disable_recovery);
        assert!(!options.disable_request_id);
        assert_eq!(options.health_path, "/health");
        assert_eq!(options.metrics_path, "/metrics");
        assert_eq!(options.shutdown_timeout, Duration::from_secs(30));
        assert!(options.validate().is_ok());
    }

    #[rstest]
    #[case(ServerOptions::default().with_port(1), "ServiceName is required")]
    #[case(
        ServerOptions { service_name: "svc".into(), ..ServerOptions::default() },
        "ServiceVersion is required"
    )]
    #[case(
        ServerOptions {
            service_name: "svc".into(),
            service_version: "1".into(),
            ..ServerOptions::default()
        },
        "SetupRoutes function is required"
    )]
    #[case(
        ServerOptions::new("svc", "1", noop).with_health_path("health"),
        "HealthPath must start with '/'"
    )]
    fn validation_names_first_problem(#[case] options: ServerOptions, #[case] message: &str) {
        let err = options.validate().expect_err("invalid options");
        assert_eq!(err.code(), "invalid_options");
        assert!(err.to_string().ends_with(message), "{err}");
    }

    #[rstest]
    fn empty_health_path_is_accepted() {
        let options = ServerOptions::new("svc", "1", noop).with_health_path("");
        assert!(options.validate().is_ok());
        let options = ServerOptions::new("svc", "1", noop).with_metrics_path("");
        assert!(options.validate().is_err());
    }

    #[rstest]
    fn debug_hides_callback() {
        let options = ServerOptions::new("svc", "1", noop).without_logging();
        let rendered = format!("{options:?}");
        assert!(rendered.contains("has_setup_routes: true"));
        assert!(rendered.contains("disable_logging: true"));
    }
}
