//! Database liveness checks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::pool::DbPool;
use crate::health::{CheckOutcome, HealthCheck, HealthStatus};
use crate::utils::time::format_rfc3339;

/// Default bound on a single check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry checks slower than this report `degraded`.
pub const SLOW_RESPONSE_THRESHOLD: Duration = Duration::from_millis(100);

/// Outcome of one [`DbHealthChecker::check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbHealthStatus {
    /// `healthy` or `unhealthy`.
    pub status: HealthStatus,
    /// Always `postgres`.
    pub database: &'static str,
    /// Wall time of the check.
    pub response_time_ms: u64,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the check started.
    pub timestamp: DateTime<Utc>,
}

impl DbHealthStatus {
    /// Whether the check succeeded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Runs `SELECT 1` against a pool within a timeout.
#[derive(Clone)]
pub struct DbHealthChecker {
    pool: DbPool,
    timeout: Duration,
}

impl DbHealthChecker {
    /// Checker with the default five second timeout.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Replace the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ping the database.
    pub async fn check(&self) -> DbHealthStatus {
        let timestamp = Utc::now();
        let started = Instant::now();
        let error = match tokio::time::timeout(self.timeout, self.pool.ping()).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("health check timeout".to_owned()),
        };
        DbHealthStatus {
            status: if error.is_none() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            database: "postgres",
            response_time_ms: millis(started.elapsed()),
            error,
            timestamp,
        }
    }

    /// Whether [`DbHealthChecker::check`] succeeds.
    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_healthy()
    }

    /// Check plus timeout and pool occupancy.
    pub async fn check_with_details(&self) -> (DbHealthStatus, Value) {
        let status = self.check().await;
        let details = json!({
            "timeout": format!("{}ms", self.timeout.as_millis()),
            "database": status.database,
            "checked_at": format_rfc3339(&status.timestamp),
            "connections": self.pool.stats(),
        });
        (status, details)
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Message for a successful ping that took too long.
fn slow_response(elapsed: Duration) -> Option<String> {
    (elapsed > SLOW_RESPONSE_THRESHOLD).then(|| format!("slow response: {}ms", millis(elapsed)))
}

#[async_trait]
impl HealthCheck for DbHealthChecker {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> CheckOutcome {
        let (status, details) = self.check_with_details().await;
        let outcome = match status.error {
            Some(error) => CheckOutcome::unhealthy(error),
            None => match slow_response(Duration::from_millis(status.response_time_ms)) {
                Some(message) => CheckOutcome::degraded(message),
                None => CheckOutcome::healthy(),
            },
        };
        outcome.with_metadata(details)
    }
}

/// One-off [`DbHealthChecker::is_healthy`] with default settings.
pub async fn quick_health_check(pool: &DbPool) -> bool {
    DbHealthChecker::new(pool.clone()).is_healthy().await
}

/// One-off [`DbHealthChecker::check_with_details`] with default settings.
pub async fn detailed_health_check(pool: &DbPool) -> (DbHealthStatus, Value) {
    DbHealthChecker::new(pool.clone()).check_with_details().await
}
