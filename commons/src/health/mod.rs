//! Liveness, readiness and dependency health.
//!
//! [`HealthState`] holds the probe flags, [`HealthRegistry`] runs dependency
//! checks, and [`endpoints`] exposes both over HTTP. [`system`] has ready-made
//! checks for external services and resource usage.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod checks;
pub mod endpoints;
pub mod system;

pub use checks::{
    CheckOutcome, CheckResult, FnCheck, HealthCheck, HealthRegistry, HealthReport, HealthStatus,
};
pub use endpoints::{DEFAULT_HEALTH_PATH, HealthService, configure};
pub use system::{ExternalServiceCheck, UsageCheck};

/// Probe flags shared between the server and the health endpoints.
///
/// Starts not ready but live.
#[derive(Debug)]
pub struct HealthState {
    ready: AtomicBool,
    live: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
        }
    }
}

impl HealthState {
    /// Not ready, live.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept traffic.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Stop accepting traffic without failing liveness.
    pub fn mark_not_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Fail liveness probes so orchestrators stop routing during shutdown.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Readiness flag.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Liveness flag.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}
