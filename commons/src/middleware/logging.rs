//! Per-request access logging through `tracing`.
//!
//! One event is emitted per request once the response status is known.
//! Server errors log at `ERROR`, client errors at `WARN`, and everything else
//! at the configured level.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::USER_AGENT;
use actix_web::{Error, HttpMessage};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Level, event};

use crate::config::{Config, LogLevel};
use crate::middleware::request_id::RequestId;

/// Requests slower than this are reported by [`RequestLogger::errors_only`].
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_secs(1);

fn default_skip_paths() -> Vec<String> {
    vec!["/health".to_owned(), "/metrics".to_owned()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoggerSettings {
    level: LogLevel,
    skip_paths: Vec<String>,
    slow_threshold: Option<Duration>,
    errors_only: bool,
}

impl LoggerSettings {
    fn skips(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|skip| skip == path)
    }

    fn level_for(&self, status: StatusCode, latency: Duration) -> Option<Level> {
        if status.is_server_error() {
            return Some(Level::ERROR);
        }
        if status.is_client_error() {
            return Some(Level::WARN);
        }
        if self
            .slow_threshold
            .is_some_and(|threshold| latency > threshold)
        {
            return Some(Level::WARN);
        }
        if self.errors_only {
            return None;
        }
        match self.level {
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Warn | LogLevel::Error => None,
        }
    }
}

/// Access-log middleware.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use service_commons::config::LogLevel;
/// use service_commons::middleware::RequestLogger;
///
/// let app = App::new().wrap(RequestLogger::new(LogLevel::Debug).with_skip_paths(["/ping"]));
/// ```
#[derive(Debug, Clone)]
pub struct RequestLogger {
    settings: Arc<LoggerSettings>,
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl RequestLogger {
    /// Log successes at `level`, skipping `/health` and `/metrics`.
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self {
            settings: Arc::new(LoggerSettings {
                level,
                skip_paths: default_skip_paths(),
                slow_threshold: None,
                errors_only: false,
            }),
        }
    }

    /// Level taken from `LOG_LEVEL`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.log_level())
    }

    /// Log failures, plus successes slower than one second.
    #[must_use]
    pub fn errors_only() -> Self {
        let mut logger = Self::new(LogLevel::Info);
        let settings = Arc::make_mut(&mut logger.settings);
        settings.errors_only = true;
        settings.slow_threshold = Some(DEFAULT_SLOW_THRESHOLD);
        logger
    }

    /// Replace the skipped paths (exact match).
    #[must_use]
    pub fn with_skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.settings).skip_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Report successes slower than `threshold` at `WARN`.
    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        Arc::make_mut(&mut self.settings).slow_threshold = Some(threshold);
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerService {
            service,
            settings: Arc::clone(&self.settings),
        }))
    }
}

/// Service wrapper produced by [`RequestLogger`].
pub struct RequestLoggerService<S> {
    service: S,
    settings: Arc<LoggerSettings>,
}

struct RequestSummary {
    method: String,
    path: String,
    client_ip: String,
    user_agent: String,
    request_id: Option<RequestId>,
}

impl RequestSummary {
    fn capture(req: &ServiceRequest) -> Self {
        let path = match req.query_string() {
            "" => req.path().to_owned(),
            query => format!("{}?{query}", req.path()),
        };
        Self {
            method: req.method().to_string(),
            path,
            client_ip: req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("-")
                .to_owned(),
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-")
                .to_owned(),
            request_id: req.extensions().get::<RequestId>().cloned(),
        }
    }

    fn emit(&self, level: Level, status: StatusCode, latency: Duration) {
        let request_id = self
            .request_id
            .as_ref()
            .map_or_else(String::new, ToString::to_string);
        let latency_ms = latency.as_secs_f64() * 1000.0;
        macro_rules! emit_at {
            ($level:expr) => {
                event!(
                    $level,
                    method = %self.method,
                    path = %self.path,
                    status = status.as_u16(),
                    latency_ms,
                    client_ip = %self.client_ip,
                    user_agent = %self.user_agent,
                    request_id = %request_id,
                    "request completed"
                )
            };
        }
        match level {
            Level::ERROR => emit_at!(Level::ERROR),
            Level::WARN => emit_at!(Level::WARN),
            Level::INFO => emit_at!(Level::INFO),
            Level::DEBUG => emit_at!(Level::DEBUG),
            _ => emit_at!(Level::TRACE),
        }
    }
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.settings.skips(req.path()) {
            return Box::pin(self.service.call(req));
        }
        let summary = RequestSummary::capture(&req);
        let settings = Arc::clone(&self.settings);
        let started = Instant::now();
        let fut = self.service.call(req);
        Box::pin(async move {
            let result = fut.await;
            let latency = started.elapsed();
            let status = match &result {
                Ok(res) => res.status(),
                Err(err) => err.as_response_error().status_code(),
            };
            if let Some(level) = settings.level_for(status, latency) {
                summary.emit(level, status, latency);
            }
            result
        })
    }
}
