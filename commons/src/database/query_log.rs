//! Statement logging through `tracing`, driven by `POSTGRES_LOG_LEVEL`.

use std::time::{Duration, Instant};

use diesel::connection::{Instrumentation, InstrumentationEvent};
use tracing::{Level, error, info, warn};

use crate::config::DatabaseLogLevel;

/// Statements slower than this are reported at `warn` and `info` levels.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(200);

/// Diesel instrumentation emitting one event per finished statement.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    level: DatabaseLogLevel,
    slow_threshold: Duration,
    started: Option<Instant>,
}

impl QueryLogger {
    /// Logger for `level` with the default slow threshold.
    #[must_use]
    pub const fn new(level: DatabaseLogLevel) -> Self {
        Self {
            level,
            slow_threshold: SLOW_QUERY_THRESHOLD,
            started: None,
        }
    }

    /// Override the slow statement threshold.
    #[must_use]
    pub const fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Event level for a finished statement, or `None` when it is not logged.
    #[must_use]
    pub fn event_level(&self, elapsed: Duration, failed: bool) -> Option<Level> {
        let slow = elapsed >= self.slow_threshold;
        match self.level {
            DatabaseLogLevel::Silent => None,
            _ if failed => Some(Level::ERROR),
            DatabaseLogLevel::Error => None,
            DatabaseLogLevel::Warn => slow.then_some(Level::WARN),
            DatabaseLogLevel::Info if slow => Some(Level::WARN),
            DatabaseLogLevel::Info => Some(Level::INFO),
        }
    }

    fn record(&self, sql: &str, elapsed: Duration, failure: Option<String>) {
        let Some(level) = self.event_level(elapsed, failure.is_some()) else {
            return;
        };
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if level == Level::ERROR {
            error!(sql, elapsed_ms, error = failure.as_deref(), "query failed");
        } else if level == Level::WARN {
            warn!(sql, elapsed_ms, "slow query");
        } else {
            info!(sql, elapsed_ms, "query");
        }
    }
}

impl Instrumentation for QueryLogger {
    fn on_connection_event(&mut self, event: InstrumentationEvent<'_>) {
        match event {
            InstrumentationEvent::StartQuery { .. } => self.started = Some(Instant::now()),
            InstrumentationEvent::FinishQuery { query, error, .. } => {
                let elapsed = self
                    .started
                    .take()
                    .map(|started| started.elapsed())
                    .unwrap_or_default();
                self.record(&query.to_string(), elapsed, error.map(ToString::to_string));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FAST: Duration = Duration::from_millis(5);
    const SLOW: Duration = Duration::from_millis(500);

    #[rstest]
    #[case(DatabaseLogLevel::Silent, SLOW, true, None)]
    #[case(DatabaseLogLevel::Error, FAST, true, Some(Level::ERROR))]
    #[case(DatabaseLogLevel::Error, SLOW, false, None)]
    #[case(DatabaseLogLevel::Warn, SLOW, false, Some(Level::WARN))]
    #[case(DatabaseLogLevel::Warn, FAST, false, None)]
    #[case(DatabaseLogLevel::Info, FAST, false, Some(Level::INFO))]
    #[case(DatabaseLogLevel::Info, SLOW, false, Some(Level::WARN))]
    #[case(DatabaseLogLevel::Info, FAST, true, Some(Level::ERROR))]
    fn levels_follow_configuration(
        #[case] level: DatabaseLogLevel,
        #[case] elapsed: Duration,
        #[case] failed: bool,
        #[case] expected: Option<Level>,
    ) {
        assert_eq!(QueryLogger::new(level).event_level(elapsed, failed), expected);
    }

    #[rstest]
    fn threshold_is_adjustable() {
        let logger = QueryLogger::new(DatabaseLogLevel::Warn)
            .with_slow_threshold(Duration::from_millis(1));
        assert_eq!(logger.event_level(FAST, false), Some(Level::WARN));
    }
}
