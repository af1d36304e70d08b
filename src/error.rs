//! Error types for the Hero Atlas service.
//!
//! Errors are split by layer: configuration, persistence, and the
//! enrichment service that sits on top of the external APIs.

use thiserror::Error;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A previous holder of the connection lock panicked
    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Figure not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by the enrichment workflow and its external clients.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// LLM call failed (transport, HTTP status, or unusable payload)
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },

    /// Could not reach an external service
    #[error("Connection to {service} failed: {message}")]
    Connect { service: String, message: String },

    /// Image search transport failure
    #[error("Image search error: {0}")]
    ImageSearch(String),

    /// Operation timed out
    #[error("Timeout in {stage} after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Request named no figure
    #[error("Invalid figure name: {0:?}")]
    InvalidName(String),
}

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Convenience type alias for service results.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
