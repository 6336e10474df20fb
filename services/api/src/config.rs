//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use greenlog_core::LogAppendStrategy;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where plant documents and auth tokens live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store_backend: StoreBackend,
    pub log_level: Level,
    /// Namespace for plant collections, so several deployments can share one database.
    pub app_id: String,
    /// Token tried by WebSocket sessions that arrive without one of their own.
    pub initial_auth_token: Option<String>,
    pub max_upload_bytes: usize,
    pub allowed_origin: String,
    pub log_append_strategy: LogAppendStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store_backend: StoreBackend::Memory,
            log_level: Level::INFO,
            app_id: "plant-tracker-app".to_string(),
            initial_auth_token: None,
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_origin: "http://localhost:3000".to_string(),
            log_append_strategy: LogAppendStrategy::Atomic,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Load Server and Store Settings ---
        let bind_address = match lookup("BIND_ADDRESS") {
            Some(value) => value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            None => defaults.bind_address,
        };

        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store_backend = match backend.to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Session and Upload Settings ---
        let app_id = lookup("APP_ID").unwrap_or(defaults.app_id);
        let initial_auth_token = lookup("INITIAL_AUTH_TOKEN").filter(|token| !token.is_empty());

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(value) => value.parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("MAX_UPLOAD_BYTES".to_string(), e.to_string())
            })?,
            None => defaults.max_upload_bytes,
        };

        let allowed_origin = lookup("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin);

        let log_append_strategy = match lookup("LOG_APPEND_STRATEGY").as_deref() {
            None | Some("atomic") => LogAppendStrategy::Atomic,
            Some("read_modify_write") => LogAppendStrategy::ReadModifyWrite,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "LOG_APPEND_STRATEGY".to_string(),
                    format!("'{}' is not one of atomic, read_modify_write", other),
                ))
            }
        };

        Ok(Self {
            bind_address,
            store_backend,
            log_level,
            app_id,
            initial_auth_token,
            max_upload_bytes,
            allowed_origin,
            log_append_strategy,
        })
    }
}
