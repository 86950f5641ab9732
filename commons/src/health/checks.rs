//! Dependency checks and the registry that runs them.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health of a dependency or of the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Working with reduced performance.
    Degraded,
    /// Not working.
    Unhealthy,
}

impl HealthStatus {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Unhealthy if any input is, else degraded if any input is, else
    /// healthy. An empty input is healthy.
    pub fn aggregate(statuses: impl IntoIterator<Item = Self>) -> Self {
        statuses
            .into_iter()
            .fold(Self::Healthy, |overall, status| match (overall, status) {
                (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
                (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
                _ => Self::Healthy,
            })
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a [`HealthCheck`] reports; the registry adds name and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Reported status.
    pub status: HealthStatus,
    /// Explanation for non-healthy results.
    pub message: Option<String>,
    /// Check-specific details.
    pub metadata: Option<Value>,
}

impl CheckOutcome {
    /// Healthy, no message.
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            metadata: None,
        }
    }

    /// Degraded with `message`.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            metadata: None,
        }
    }

    /// Unhealthy with `message`.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: None,
        }
    }

    /// Attach details.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Timed, named result of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name.
    pub name: String,
    /// Reported status.
    pub status: HealthStatus,
    /// Explanation for non-healthy results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the check finished.
    pub last_checked: DateTime<Utc>,
    /// Time the check took.
    pub duration_ms: u64,
    /// Check-specific details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A dependency probe.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Name reported in results.
    fn name(&self) -> &str;

    /// Probe the dependency.
    async fn check(&self) -> CheckOutcome;
}

type CheckFn = dyn Fn() -> BoxFuture<'static, CheckOutcome> + Send + Sync;

/// [`HealthCheck`] backed by an async closure.
///
/// # Examples
/// ```
/// use service_commons::health::{CheckOutcome, FnCheck};
///
/// let cache = FnCheck::new("cache", || async { CheckOutcome::healthy() });
/// ```
pub struct FnCheck {
    name: String,
    probe: Box<CheckFn>,
}

impl FnCheck {
    /// Named check calling `probe`.
    pub fn new<F, Fut>(name: impl Into<String>, probe: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckOutcome> + Send + 'static,
    {
        Self {
            name: name.into(),
            probe: Box::new(move || Box::pin(probe())),
        }
    }
}

#[async_trait]
impl HealthCheck for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        (self.probe)().await
    }
}

/// Aggregated result of [`HealthRegistry::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Individual results in registration order.
    pub checks: Vec<CheckResult>,
}

/// Registered checks, run concurrently on demand.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check.
    pub fn register(&mut self, check: impl HealthCheck + 'static) {
        self.checks.push(Arc::new(check));
    }

    /// Builder form of [`HealthRegistry::register`].
    #[must_use]
    pub fn with_check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.register(check);
        self
    }

    /// Number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check and aggregate.
    pub async fn run(&self) -> HealthReport {
        let checks = join_all(self.checks.iter().map(|check| run_one(check.as_ref()))).await;
        HealthReport {
            status: HealthStatus::aggregate(checks.iter().map(|result| result.status)),
            checks,
        }
    }
}

async fn run_one(check: &dyn HealthCheck) -> CheckResult {
    let started = Instant::now();
    let outcome = check.check().await;
    CheckResult {
        name: check.name().to_owned(),
        status: outcome.status,
        message: outcome.message,
        last_checked: Utc::now(),
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        metadata: outcome.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    use super::HealthStatus::{Degraded, Healthy, Unhealthy};

    #[rstest]
    #[case(&[], Healthy)]
    #[case(&[Healthy, Healthy], Healthy)]
    #[case(&[Healthy, Degraded], Degraded)]
    #[case(&[Degraded, Unhealthy, Healthy], Unhealthy)]
    #[case(&[Unhealthy, Degraded], Unhealthy)]
    fn aggregate_prefers_worst(#[case] statuses: &[HealthStatus], #[case] expected: HealthStatus) {
        assert_eq!(HealthStatus::aggregate(statuses.iter().copied()), expected);
    }

    #[tokio::test]
    async fn registry_runs_checks_in_order() {
        let registry = HealthRegistry::new()
            .with_check(FnCheck::new("cache", || async { CheckOutcome::healthy() }))
            .with_check(FnCheck::new("queue", || async {
                CheckOutcome::degraded("lagging").with_metadata(json!({"lag": 12}))
            }));
        assert_eq!(registry.len(), 2);

        let report = registry.run().await;
        assert_eq!(report.status, Degraded);
        let names: Vec<&str> = report.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cache", "queue"]);
        assert_eq!(report.checks[1].message.as_deref(), Some("lagging"));
        assert_eq!(report.checks[1].metadata, Some(json!({"lag": 12})));
    }

    #[tokio::test]
    async fn empty_registry_is_healthy() {
        let report = HealthRegistry::new().run().await;
        assert_eq!(report.status, Healthy);
        assert!(report.checks.is_empty());
    }

    #[rstest]
    fn results_serialise_lowercase_status() {
        let result = CheckResult {
            name: "db".to_owned(),
            status: Unhealthy,
            message: Some("down".to_owned()),
            last_checked: Utc::now(),
            duration_ms: 1,
            metadata: None,
        };
        let value = serde_json::to_value(result).expect("serialise");
        assert_eq!(value["status"], "unhealthy");
        assert!(value.get("metadata").is_none());
    }
}
