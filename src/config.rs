//! Configuration for the tabula server.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port)
//! - Database settings (connect timeout, initial connections)

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::DEFAULT_CONNECT_TIMEOUT;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 3000).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// One pre-configured database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Registry name for the connection.
    pub name: String,

    /// Backend connection string; a `postgres://` scheme selects the
    /// PostgreSQL adapter, anything else is treated as SQLite.
    pub conn_string: String,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Timeout for opening a backend connection (default: "30s").
    pub connect_timeout: String,

    /// Connections registered at startup.
    pub connections: Vec<ConnectionConfig>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connect_timeout: "30s".to_string(),
            connections: Vec::new(),
        }
    }
}

impl DatabaseConfig {
    /// Parsed connect timeout. Falls back to the default for a value that
    /// slipped past validation.
    pub fn connect_timeout(&self) -> Duration {
        parse_duration(&self.connect_timeout).unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server configuration.
    pub server: ServerConfig,

    /// Database configuration.
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::Validation(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server port must be non-zero".to_string(),
            ));
        }

        parse_duration(&self.database.connect_timeout)
            .map_err(|e| ConfigError::Validation(format!("database connect_timeout: {}", e)))?;

        let mut seen = std::collections::HashSet::new();
        for conn in &self.database.connections {
            if conn.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "connection name must not be empty".to_string(),
                ));
            }
            if conn.conn_string.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "connection '{}' has an empty conn_string",
                    conn.name
                )));
            }
            if !seen.insert(conn.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate connection name: '{}'",
                    conn.name
                )));
            }
        }

        Ok(())
    }
}

/// Parse a duration string using humantime.
///
/// Supports formats like `30s`, `1m`, `5m30s`, `1h`, `100ms`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
