//! Error types for track resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// External catalog lookup failed (network, HTTP status, malformed response)
    #[error("Catalog lookup error: {0}")]
    Catalog(String),

    #[error("Manual map error: {0}")]
    ManualMap(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ResolveError>;
