//! Postgres access: pooled connections, connect-with-retry, health checks
//! and migrations.

pub mod connection;
pub mod health;
pub mod migration;
pub mod pool;
pub mod query_log;

pub use connection::{
    ConnectError, ConnectionManager, RetryExhausted, RetryPolicy, connect_with_config,
};
pub use health::{
    DEFAULT_CHECK_TIMEOUT, DbHealthChecker, DbHealthStatus, SLOW_RESPONSE_THRESHOLD,
    detailed_health_check, quick_health_check,
};
pub use migration::{MigrationError, MigrationOptions, Migrator, quick_migrate, unsafe_migrate};
pub use pool::{DbPool, PoolConfig, PoolError, PoolStats};
pub use query_log::{QueryLogger, SLOW_QUERY_THRESHOLD};
