//! Error types for the database abstraction layer.
//!
//! All adapter and registry operations return [`DbError`] on failure. Driver
//! errors are passed through verbatim; no attempt is made to map engine error
//! codes onto a richer taxonomy.

use thiserror::Error;

/// Errors that can occur in the database layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Method called on a closed adapter.
    #[error("database not connected")]
    NotConnected,

    /// Registry already holds a connection with this name.
    #[error("connection already exists: {0}")]
    ConnectionExists(String),

    /// Registry has no connection with this name.
    #[error("connection not found: {0}")]
    ConnectionMiss(String),

    /// Malformed caller input (empty key, empty row, missing field, ...).
    #[error("{0}")]
    Validation(String),

    /// Could not open or reach the backend.
    #[error("connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    /// Underlying driver error, passed through verbatim.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DbError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
