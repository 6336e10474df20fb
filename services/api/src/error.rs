//! services/api/src/error.rs
//!
//! Startup and wiring failures of the GreenLog service. Request handlers map their
//! own failures to status codes; this type is what `main` returns.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Postgres error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to apply migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding the listener or serving connections.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
