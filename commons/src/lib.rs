//! Shared building blocks for actix-web microservices.
//!
//! - [`config`] reads service, database and authentication settings from the
//!   environment.
//! - [`middleware`] provides request IDs, access logging, panic recovery,
//!   CORS and authentication layers.
//! - [`responses`] builds the JSON success, error and paginated envelopes.
//! - [`health`] serves liveness, readiness and dependency probes.
//! - [`database`] pools Postgres connections with retry, health checks and
//!   migrations.
//! - [`server`] assembles all of the above around the caller's routes.
//! - [`types`] holds shared enums, record models and list, batch and search
//!   bodies.

pub mod config;
pub mod database;
pub mod health;
pub mod middleware;
pub mod responses;
pub mod server;
pub mod telemetry;
pub mod types;
pub mod utils;

/// Framework-free pagination arithmetic and cursors.
pub use pagination;

pub use config::{Config, ConfigError};
pub use server::{Server, ServerError, ServerOptions};
