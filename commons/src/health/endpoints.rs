//! HTTP health endpoints.
//!
//! | Route | Behaviour |
//! |---|---|
//! | `GET {path}` | service identity and uptime; 503 once draining |
//! | `GET {path}/detailed` | adds environment, config summary and checks |
//! | `GET /ready` | runs checks; 503 when not ready or unhealthy |
//! | `GET /live` | 503 once marked unhealthy |
//!
//! Every response carries `Cache-Control: no-store`.

use std::time::{Duration, Instant};

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CheckResult, HealthRegistry, HealthState, HealthStatus};
use crate::config::Config;

/// Default base path for the health routes.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceInfo {
    name: String,
    version: String,
    environment: String,
    port: String,
    log_level: String,
}

/// State behind the health endpoints.
pub struct HealthService {
    info: ServiceInfo,
    state: HealthState,
    registry: HealthRegistry,
    started_at: Instant,
}

impl HealthService {
    /// Identity taken from `config`; uptime counts from now.
    #[must_use]
    pub fn new(config: &Config, registry: HealthRegistry) -> Self {
        Self {
            info: ServiceInfo {
                name: config.service_name.clone(),
                version: config.service_version.clone(),
                environment: config.environment.clone(),
                port: config.port.clone(),
                log_level: config.log_level.clone(),
            },
            state: HealthState::new(),
            registry,
            started_at: Instant::now(),
        }
    }

    /// Probe flags.
    #[must_use]
    pub fn state(&self) -> &HealthState {
        &self.state
    }

    /// Registered checks.
    #[must_use]
    pub fn registry(&self) -> &HealthRegistry {
        &self.registry
    }

    /// Time since construction.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn summary(&self, status: HealthStatus) -> HealthSummary {
        let uptime = self.uptime();
        HealthSummary {
            status,
            service: self.info.name.clone(),
            version: self.info.version.clone(),
            timestamp: Utc::now(),
            uptime: format_uptime(uptime),
            uptime_seconds: uptime.as_secs(),
        }
    }

    fn liveness(&self) -> HealthStatus {
        if self.state.is_alive() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Body of `GET {path}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Overall status.
    pub status: HealthStatus,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Response time.
    pub timestamp: DateTime<Utc>,
    /// Uptime such as `1h2m5s`.
    pub uptime: String,
    /// Uptime in whole seconds.
    pub uptime_seconds: u64,
}

/// Configuration echoed by the detailed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    /// Listening port.
    pub port: String,
    /// Log level name.
    pub log_level: String,
    /// Deployment environment.
    pub environment: String,
}

/// Body of `GET {path}/detailed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedHealth {
    /// Identity and uptime.
    #[serde(flatten)]
    pub summary: HealthSummary,
    /// Deployment environment.
    pub environment: String,
    /// Selected configuration.
    pub config: ConfigSummary,
    /// Dependency results.
    pub checks: Vec<CheckResult>,
}

/// Body of the readiness and liveness probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// `ready`, `not_ready`, `alive` or `shutting_down`.
    pub status: String,
    /// Dependency results (readiness only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckResult>,
}

fn no_store<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(body)
}

const fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    }
}

/// Render `uptime` as hours, minutes and seconds, omitting leading zeros.
fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m{seconds}s"),
        _ => format!("{hours}h{minutes}m{seconds}s"),
    }
}

async fn health(service: web::Data<HealthService>) -> HttpResponse {
    let status = service.liveness();
    no_store(status_code(status), &service.summary(status))
}

async fn detailed(service: web::Data<HealthService>) -> HttpResponse {
    let report = service.registry.run().await;
    let status = HealthStatus::aggregate([service.liveness(), report.status]);
    let info = &service.info;
    let body = DetailedHealth {
        summary: service.summary(status),
        environment: info.environment.clone(),
        config: ConfigSummary {
            port: info.port.clone(),
            log_level: info.log_level.clone(),
            environment: info.environment.clone(),
        },
        checks: report.checks,
    };
    no_store(status_code(status), &body)
}

async fn ready(service: web::Data<HealthService>) -> HttpResponse {
    let report = service.registry.run().await;
    let ready = service.state.is_ready() && report.status != HealthStatus::Unhealthy;
    let (code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    no_store(
        code,
        &ProbeResponse {
            status: status.to_owned(),
            checks: report.checks,
        },
    )
}

async fn live(service: web::Data<HealthService>) -> HttpResponse {
    let (code, status) = if service.state.is_alive() {
        (StatusCode::OK, "alive")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    };
    no_store(
        code,
        &ProbeResponse {
            status: status.to_owned(),
            checks: Vec::new(),
        },
    )
}

/// Register the health routes under `path` plus `/ready` and `/live`.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use service_commons::config::Config;
/// use service_commons::health::{HealthRegistry, HealthService, configure};
///
/// let health = web::Data::new(HealthService::new(&Config::default(), HealthRegistry::new()));
/// let app = App::new().configure(|cfg| configure(cfg, "/health", health.clone()));
/// ```
pub fn configure(cfg: &mut web::ServiceConfig, path: &str, service: web::Data<HealthService>) {
    let base = match path.trim_end_matches('/') {
        "" => DEFAULT_HEALTH_PATH,
        trimmed => trimmed,
    };
    cfg.app_data(service)
        .route(base, web::get().to(health))
        .route(&format!("{base}/detailed"), web::get().to(detailed))
        .route("/ready", web::get().to(ready))
        .route("/live", web::get().to(live));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{CheckOutcome, FnCheck};
    use actix_web::test::{self};
    use actix_web::App;
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> Config {
        Config {
            service_name: "orders".to_owned(),
            service_version: "2.1.0".to_owned(),
            environment: "staging".to_owned(),
            ..Config::default()
        }
    }

    fn service(config: &Config, outcome: CheckOutcome) -> web::Data<HealthService> {
        let registry = HealthRegistry::new().with_check(FnCheck::new("db", move || {
            let outcome = outcome.clone();
            async move { outcome }
        }));
        web::Data::new(HealthService::new(config, registry))
    }

    #[rstest]
    #[case(Duration::from_secs(0), "0s")]
    #[case(Duration::from_secs(59), "59s")]
    #[case(Duration::from_secs(61), "1m1s")]
    #[case(Duration::from_secs(3725), "1h2m5s")]
    #[case(Duration::from_secs(90_000), "25h0m0s")]
    fn uptime_formatting(#[case] uptime: Duration, #[case] expected: &str) {
        assert_eq!(format_uptime(uptime), expected);
    }

    #[rstest]
    #[actix_web::test]
    async fn basic_health_reports_identity(config: Config) {
        let health = service(&config, CheckOutcome::healthy());
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, "/status/", health.clone())),
        )
        .await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
        let body: HealthSummary = test::read_body_json(res).await;
        assert_eq!(body.status, HealthStatus::Healthy);
        assert_eq!(body.service, "orders");
        assert_eq!(body.version, "2.1.0");

        health.state().mark_unhealthy();
        let req = test::TestRequest::get().uri("/status").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[rstest]
    #[actix_web::test]
    async fn detailed_health_includes_checks(config: Config) {
        let health = service(&config, CheckOutcome::degraded("slow"));
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, DEFAULT_HEALTH_PATH, health.clone())),
        )
        .await;

        let req = test::TestRequest::get().uri("/health/detailed").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: DetailedHealth = test::read_body_json(res).await;
        assert_eq!(body.summary.status, HealthStatus::Degraded);
        assert_eq!(body.environment, "staging");
        assert_eq!(body.config.port, "8000");
        assert_eq!(body.config.log_level, "info");
        assert_eq!(body.checks.len(), 1);
        assert_eq!(body.checks[0].name, "db");
    }

    #[rstest]
    #[case(false, CheckOutcome::healthy(), StatusCode::SERVICE_UNAVAILABLE, "not_ready")]
    #[case(true, CheckOutcome::healthy(), StatusCode::OK, "ready")]
    #[case(true, CheckOutcome::degraded("slow"), StatusCode::OK, "ready")]
    #[case(
        true,
        CheckOutcome::unhealthy("down"),
        StatusCode::SERVICE_UNAVAILABLE,
        "not_ready"
    )]
    #[actix_web::test]
    async fn readiness_combines_flag_and_checks(
        config: Config,
        #[case] marked_ready: bool,
        #[case] outcome: CheckOutcome,
        #[case] expected_code: StatusCode,
        #[case] expected_status: &str,
    ) {
        let health = service(&config, outcome);
        if marked_ready {
            health.state().mark_ready();
        }
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, DEFAULT_HEALTH_PATH, health.clone())),
        )
        .await;
        let req = test::TestRequest::get().uri("/ready").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), expected_code);
        let body: ProbeResponse = test::read_body_json(res).await;
        assert_eq!(body.status, expected_status);
        assert_eq!(body.checks.len(), 1);
    }

    #[rstest]
    #[actix_web::test]
    async fn liveness_fails_once_draining(config: Config) {
        let health = service(&config, CheckOutcome::unhealthy("ignored"));
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, DEFAULT_HEALTH_PATH, health.clone())),
        )
        .await;

        let req = test::TestRequest::get().uri("/live").to_request();
        let body: ProbeResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "alive");
        assert!(body.checks.is_empty());

        health.state().mark_unhealthy();
        let req = test::TestRequest::get().uri("/live").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
