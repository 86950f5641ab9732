//! Ready-made checks for external services and resource usage.

use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpStream;
use url::Url;

use super::checks::{CheckOutcome, HealthCheck, HealthStatus};

/// Reports whether an external service accepts TCP connections.
///
/// The host and port come from the URL; schemes with a well-known port such
/// as `https` need no explicit port.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use service_commons::health::ExternalServiceCheck;
///
/// let check = ExternalServiceCheck::new("billing", "https://billing.internal", Duration::from_secs(2))
///     .expect("valid URL");
/// ```
#[derive(Debug, Clone)]
pub struct ExternalServiceCheck {
    name: String,
    url: Url,
    timeout: Duration,
}

impl ExternalServiceCheck {
    /// Check `url` within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `url` is not absolute.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: name.into(),
            url: Url::parse(url)?,
            timeout,
        })
    }
}

#[async_trait]
impl HealthCheck for ExternalServiceCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        let (Some(host), Some(port)) = (self.url.host_str(), self.url.port_or_known_default())
        else {
            return CheckOutcome::unhealthy("URL has no host or port");
        };
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, TcpStream::connect((host, port)))
            .await
        {
            Ok(Ok(_)) => CheckOutcome::healthy(),
            Ok(Err(err)) => CheckOutcome::unhealthy(format!("connection failed: {err}")),
            Err(_) => CheckOutcome::unhealthy(format!(
                "no connection within {}ms",
                self.timeout.as_millis()
            )),
        };
        outcome.with_metadata(json!({
            "url": self.url.as_str(),
            "timeout_ms": u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            "response_time_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }))
    }
}

type Sampler = dyn Fn() -> io::Result<u64> + Send + Sync;

/// Compares a sampled quantity against a limit.
///
/// Above 80% of the limit is degraded and above the limit is unhealthy. A
/// failed sample is reported as degraded.
pub struct UsageCheck {
    name: String,
    limit: u64,
    sample: Box<Sampler>,
}

impl std::fmt::Debug for UsageCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageCheck")
            .field("name", &self.name)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl UsageCheck {
    /// Named check comparing `sample()` with `limit`.
    ///
    /// # Examples
    /// ```
    /// use service_commons::health::UsageCheck;
    ///
    /// // Disk usage in percent, sampled by the embedding service.
    /// let disk = UsageCheck::new("disk", 90, || Ok(45));
    /// ```
    pub fn new<F>(name: impl Into<String>, limit: u64, sample: F) -> Self
    where
        F: Fn() -> io::Result<u64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            limit,
            sample: Box::new(sample),
        }
    }

    /// Resident memory of this process against `max_mb` megabytes.
    ///
    /// Sampling reads `/proc/self/status`, so other platforms report a
    /// degraded check.
    #[must_use]
    pub fn memory(max_mb: u64) -> Self {
        Self::new("memory", max_mb, resident_memory_mb)
    }

    /// Status for `current` against the limit.
    #[must_use]
    pub const fn classify(&self, current: u64) -> HealthStatus {
        if current > self.limit {
            HealthStatus::Unhealthy
        } else if current.saturating_mul(5) > self.limit.saturating_mul(4) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[async_trait]
impl HealthCheck for UsageCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        let current = match (self.sample)() {
            Ok(current) => current,
            Err(err) => return CheckOutcome::degraded(format!("{} not sampled: {err}", self.name)),
        };
        let outcome = match self.classify(current) {
            HealthStatus::Healthy => CheckOutcome::healthy(),
            HealthStatus::Degraded => {
                CheckOutcome::degraded(format!("{} usage approaching threshold", self.name))
            }
            HealthStatus::Unhealthy => {
                CheckOutcome::unhealthy(format!("{} usage exceeded threshold", self.name))
            }
        };
        outcome.with_metadata(json!({
            "current": current,
            "limit": self.limit,
            "usage_percent": current.saturating_mul(100).checked_div(self.limit),
        }))
    }
}

fn resident_memory_mb() -> io::Result<u64> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    parse_resident_kb(&status)
        .map(|kb| kb >> 10)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no VmRSS entry"))
}

fn parse_resident_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::net::TcpListener;

    #[rstest]
    #[case(10, HealthStatus::Healthy)]
    #[case(80, HealthStatus::Healthy)]
    #[case(81, HealthStatus::Degraded)]
    #[case(100, HealthStatus::Degraded)]
    #[case(101, HealthStatus::Unhealthy)]
    fn usage_thresholds(#[case] current: u64, #[case] expected: HealthStatus) {
        let check = UsageCheck::new("disk", 100, || Ok(0));
        assert_eq!(check.classify(current), expected);
    }

    #[tokio::test]
    async fn usage_outcome_reports_sample() {
        let check = UsageCheck::new("disk", 90, || Ok(95));
        let outcome = check.check().await;
        assert_eq!(outcome.status, HealthStatus::Unhealthy);
        assert_eq!(outcome.message.as_deref(), Some("disk usage exceeded threshold"));
        let metadata = outcome.metadata.expect("metadata");
        assert_eq!(metadata["current"], 95);
        assert_eq!(metadata["usage_percent"], 105);
    }

    #[tokio::test]
    async fn failed_samples_degrade() {
        let check = UsageCheck::new("disk", 90, || {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no statvfs"))
        });
        assert_eq!(check.check().await.status, HealthStatus::Degraded);
    }

    #[rstest]
    fn resident_memory_is_read_from_status() {
        let status = "Name:\tsvc\nVmPeak:\t  9000 kB\nVmRSS:\t   5120 kB\nThreads:\t4\n";
        assert_eq!(parse_resident_kb(status), Some(5120));
        assert_eq!(parse_resident_kb("Name:\tsvc\n"), None);
    }

    #[tokio::test]
    async fn reachable_services_are_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = format!("http://127.0.0.1:{port}/health");
        let check = ExternalServiceCheck::new("peer", &url, Duration::from_secs(1)).expect("url");
        let outcome = check.check().await;
        assert_eq!(outcome.status, HealthStatus::Healthy);
        assert_eq!(outcome.metadata.expect("metadata")["url"], url);
    }

    #[tokio::test]
    async fn unreachable_services_are_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let url = format!("http://127.0.0.1:{port}");
        let check = ExternalServiceCheck::new("peer", &url, Duration::from_secs(1)).expect("url");
        assert_eq!(check.check().await.status, HealthStatus::Unhealthy);
    }

    #[rstest]
    fn relative_urls_are_rejected() {
        assert!(ExternalServiceCheck::new("peer", "/just/a/path", Duration::from_secs(1)).is_err());
    }
}
