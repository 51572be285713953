//! Error types for readalong
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the readalong engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clip or alignment resource could not be resolved
    #[error("Media resource error: {0}")]
    Media(String),

    /// Playback rate must be strictly positive
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    /// JSON payload errors (manuscript or alignment documents)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the readalong Error
pub type Result<T> = std::result::Result<T, Error>;
