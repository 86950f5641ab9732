//! Connect-with-retry on top of [`DbPool`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::pool::{DbPool, PoolConfig, PoolError};
use crate::config::DatabaseConfig;

/// Errors raised while establishing the pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The settings could not be turned into a pool configuration.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Every attempt failed.
    #[error("failed to connect to database after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: PoolError,
    },
}

/// Final failure of [`RetryPolicy::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// Attempts made.
    pub attempts: u32,
    /// Error from the last attempt.
    pub last_error: E,
}

/// Fixed-delay retry loop.
///
/// Attempts are separated by a constant pause, with no backoff or jitter. A
/// policy with zero attempts still makes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Up to `max_attempts` attempts, `delay` apart.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Attempts taken from `DB_MAX_RETRIES` and `DB_RETRY_DELAY_SECONDS`.
    #[must_use]
    pub const fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }

    /// Attempts that will actually be made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Call `operation` with the 1-based attempt number until it succeeds or
    /// the attempts run out. Sleeps between attempts, never after the last.
    ///
    /// # Errors
    ///
    /// Returns [`RetryExhausted`] carrying the final error.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            info!(attempt, max_attempts = attempts, "attempting database connection");
            match operation(attempt).await {
                Ok(value) => {
                    info!(attempt, "database connection established");
                    return Ok(value);
                }
                Err(err) if attempt < attempts => {
                    warn!(
                        attempt,
                        error = %err,
                        retry_in_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
                        "database connection failed; retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "database connection failed; giving up");
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
            }
        }
    }
}

/// Owns the service's pool and knows how to rebuild it.
///
/// # Examples
///
/// ```no_run
/// use service_commons::config::Config;
/// use service_commons::database::ConnectionManager;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = ConnectionManager::new(Config::load().database);
/// let pool = manager.connect().await?;
/// pool.ping().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    config: DatabaseConfig,
    policy: RetryPolicy,
    pool: Option<DbPool>,
}

impl ConnectionManager {
    /// Manager retrying per the config's retry settings.
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            config,
            policy,
            pool: None,
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the pool and verify it with `SELECT 1`, retrying on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Pool`] when the settings cannot form a URL and
    /// [`ConnectError::Exhausted`] when every attempt fails.
    pub async fn connect(&mut self) -> Result<DbPool, ConnectError> {
        let pool_config = PoolConfig::from_database_config(&self.config)?;
        let pool = self
            .policy
            .run(|_| {
                let pool_config = pool_config.clone();
                async move {
                    let pool = DbPool::new(pool_config).await?;
                    pool.ping().await?;
                    Ok::<_, PoolError>(pool)
                }
            })
            .await
            .map_err(|exhausted| ConnectError::Exhausted {
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })?;
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    /// The pool from the last successful [`ConnectionManager::connect`].
    #[must_use]
    pub fn pool(&self) -> Option<&DbPool> {
        self.pool.as_ref()
    }

    /// Drop the managed pool. Connections close once every clone is gone.
    pub fn close(&mut self) {
        if self.pool.take().is_some() {
            info!("database pool released");
        }
    }

    /// Close and connect again.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::connect`].
    pub async fn reconnect(&mut self) -> Result<DbPool, ConnectError> {
        self.close();
        self.connect().await
    }
}

/// Connect once with the retry settings in `config`.
///
/// # Errors
///
/// See [`ConnectionManager::connect`].
pub async fn connect_with_config(config: DatabaseConfig) -> Result<DbPool, ConnectError> {
    ConnectionManager::new(config).connect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let result = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("refused {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reports_last_error_when_exhausted() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result: Result<(), _> = policy
            .run(|attempt| async move { Err(format!("refused {attempt}")) })
            .await;
        assert_eq!(
            result,
            Err(RetryExhausted {
                attempts: 2,
                last_error: "refused 2".to_owned(),
            })
        );
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(3, 3)]
    fn zero_attempts_still_tries_once(#[case] configured: u32, #[case] expected: u32) {
        assert_eq!(RetryPolicy::new(configured, Duration::ZERO).attempts(), expected);
    }

    #[rstest]
    fn policy_follows_database_config() {
        let config = DatabaseConfig {
            max_retries: 7,
            retry_delay: Duration::from_secs(2),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            RetryPolicy::from_config(&config),
            RetryPolicy::new(7, Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn unusable_address_fails_before_retrying() {
        let config = DatabaseConfig {
            host: "bad host".to_owned(),
            ..DatabaseConfig::default()
        };
        let mut manager = ConnectionManager::new(config);
        let err = manager.connect().await.expect_err("address cannot form a URL");
        assert!(matches!(err, ConnectError::Pool(PoolError::Build { .. })));
        assert!(manager.pool().is_none());
        manager.close();
    }
}
