//! Tracing subscriber setup.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;

/// Filter from `RUST_LOG` when set, otherwise from `LOG_LEVEL`.
#[must_use]
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level().as_filter()))
}

/// Install the global subscriber: JSON lines in production, compact text
/// elsewhere.
///
/// A subscriber that is already installed is left in place.
pub fn init_tracing(config: &Config) {
    let filter = env_filter(config);
    let result = if config.is_production() {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).compact().try_init()
    };
    if let Err(e) = result {
        warn!(error = %e, "tracing init failed");
    }
}
