//! HTTP server assembly.
//!
//! [`Server`] loads configuration, registers the health routes and the
//! caller's routes, then wraps them in the standard middleware stack:
//! request IDs outermost, then the access log, panic recovery and CORS.

use std::io;
use std::time::Duration;

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::health::{self, HealthService};
use crate::middleware::{CorsSettings, Recovery, RequestIdMiddleware, RequestLogger};

#[cfg(feature = "metrics")]
mod metrics;
mod options;
mod toggle;

pub use options::{DEFAULT_METRICS_PATH, DEFAULT_SHUTDOWN_TIMEOUT, RouteSetup, ServerOptions};
use toggle::Toggle;

/// Errors raised while building or running a [`Server`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// The options are incomplete.
    #[error("invalid server options: {0}")]
    InvalidOptions(String),
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The metrics registry could not be built.
    #[cfg(feature = "metrics")]
    #[error("metrics setup failed: {0}")]
    Metrics(String),
    /// Binding or serving failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Build an [`ServerError::InvalidOptions`].
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidOptions(_) => "invalid_options",
            Self::Config(_) => "invalid_config",
            #[cfg(feature = "metrics")]
            Self::Metrics(_) => "metrics_setup_failed",
            Self::Io(_) => "io_error",
        }
    }
}

/// Whole seconds for actix's shutdown timeout, with any fraction rounded up.
fn grace_period_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// A configured service ready to bind.
///
/// # Examples
/// ```no_run
/// use actix_web::{HttpResponse, web};
/// use service_commons::server::{Server, ServerOptions};
///
/// #[actix_web::main]
/// async fn main() -> Result<(), service_commons::server::ServerError> {
///     let options = ServerOptions::new("orders", "1.4.0", |cfg, _config| {
///         cfg.route("/orders", web::get().to(|| async { HttpResponse::Ok().finish() }));
///     });
///     Server::new(options)?.run().await
/// }
/// ```
#[derive(Clone)]
pub struct Server {
    options: ServerOptions,
    config: Config,
    health: web::Data<HealthService>,
    cors: CorsSettings,
    port: u16,
    #[cfg(feature = "metrics")]
    metrics: Option<actix_web_prom::PrometheusMetrics>,
}

impl Server {
    /// Validate `options` and resolve configuration.
    ///
    /// Configuration comes from `options.config` when set and from the
    /// environment otherwise; the options' service name and version replace
    /// defaults either way.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidOptions`] for incomplete options and
    /// [`ServerError::Config`] when configuration fails validation or the
    /// port cannot be parsed.
    pub fn new(options: ServerOptions) -> Result<Self, ServerError> {
        options.validate()?;

        let mut config = match options.config.clone() {
            Some(config) => config,
            None => Config::load_with_service_info(&options.service_name, &options.service_version),
        };
        config.apply_service_info(&options.service_name, &options.service_version);
        config.validate()?;

        let port = match options.port {
            Some(port) => port,
            None => config.bind_port()?,
        };
        let cors = options
            .cors
            .clone()
            .unwrap_or_else(|| CorsSettings::from_config(&config));
        let health = web::Data::new(HealthService::new(&config, options.health_checks.clone()));

        #[cfg(feature = "metrics")]
        let metrics = Some(metrics::build(&config.service_name, &options.metrics_path)?);

        Ok(Self {
            options,
            config,
            health,
            cors,
            port,
            #[cfg(feature = "metrics")]
            metrics,
        })
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Health state shared with the probe endpoints.
    #[must_use]
    pub fn health(&self) -> &web::Data<HealthService> {
        &self.health
    }

    /// Port the server binds.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Build the application: routes plus the enabled middleware.
    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<BoxBody>,
            Error = actix_web::Error,
            InitError = (),
        > + use<>,
    > {
        let options = &self.options;
        let config = self.config.clone();
        let health_service = self.health.clone();
        let health_path = options.health_path.clone();
        let disable_health = options.disable_health;
        let setup_routes = options.setup_routes.clone();

        let app = App::new()
            .app_data(web::Data::new(self.config.clone()))
            .configure(move |cfg| {
                if !disable_health {
                    health::configure(cfg, &health_path, health_service);
                }
                if let Some(setup) = setup_routes {
                    setup(cfg, &config);
                }
            })
            .wrap(Toggle::when(!options.disable_cors, || self.cors.build()))
            .wrap(Toggle::when(!options.disable_recovery, || {
                Recovery::from_config(&self.config)
            }))
            .wrap(Toggle::when(!options.disable_logging, || {
                RequestLogger::from_config(&self.config)
            }))
            .wrap(Toggle::when(
                !options.disable_request_id,
                RequestIdMiddleware::default,
            ));

        #[cfg(feature = "metrics")]
        let app = app.wrap(Toggle::from_option(
            self.metrics
                .clone()
                .map(actix_web::middleware::Compat::new),
        ));

        app
    }

    /// Bind and serve until a shutdown signal arrives.
    ///
    /// Readiness is reported once the listener is bound; liveness fails after
    /// the server has drained.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] when binding or serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let port = self.port;
        let health = self.health.clone();
        let grace = grace_period_secs(self.options.shutdown_timeout);
        info!(
            service = %self.config.service_name,
            version = %self.config.service_version,
            environment = %self.config.environment,
            port,
            "starting server"
        );

        let server = HttpServer::new(move || self.app())
            .bind(("0.0.0.0", port))?
            .shutdown_timeout(grace)
            .run();

        health.state().mark_ready();
        let result = server.await;
        health.state().mark_not_ready();
        health.state().mark_unhealthy();
        info!("server stopped");
        result.map_err(ServerError::from)
    }
}
