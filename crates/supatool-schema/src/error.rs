//! Error types for supatool-schema

use std::path::PathBuf;
use thiserror::Error;

/// Result type for supatool-schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Error type for supatool-schema operations.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Database error from tokio-postgres.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    /// Filesystem error tied to a path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Invalid or unreadable model file.
    #[error("Model error: {0}")]
    Model(String),
    /// Decode error when reading a column.
    #[error("Decode error for column '{column}': {message}")]
    Decode { column: String, message: String },
    /// The operator aborted an interactive prompt (Ctrl-C).
    #[error("Operation cancelled")]
    Cancelled,
    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl SchemaError {
    /// Create a decode error.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SchemaError::Io {
            path: path.into(),
            source,
        }
    }
}
