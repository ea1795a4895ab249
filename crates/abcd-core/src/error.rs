//! Error types for abcd

use thiserror::Error;

/// abcd error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error (inconsistent shapes, bad arguments)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested axis is not present on the histogram
    #[error("histogram has no axis '{0}'")]
    MissingAxis(String),

    /// Numerical failure (singular system, fit did not converge)
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
