//! Error types for output, scheduling and hub communication
use thiserror::Error;

/// Control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// DMX output error
    #[error("DMX error: {0}")]
    DmxError(String),

    /// Hub request failed at the HTTP layer
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Hub answered with something unusable
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Hub request did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the core model
    #[error(transparent)]
    Core(#[from] lightminion_core::CoreError),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
