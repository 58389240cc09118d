//! Error types for the core domain model
use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O error (config or log files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Channel address outside 1..=512
    #[error("Invalid channel address: {0} (must be 1-512)")]
    InvalidAddress(i64),

    /// Required document field absent or not an integer
    #[error("Missing or invalid field: {0}")]
    MissingField(&'static str),

    /// Universe identifier that is not a positive 16-bit number
    #[error("Invalid universe: {0} (must be 1-65535)")]
    InvalidUniverse(i64),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
