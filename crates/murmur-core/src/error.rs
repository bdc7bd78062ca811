//! Error types for the murmur core crate.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling records and timestamps.
#[derive(Error, Debug)]
pub enum Error {
    /// A timestamp string could not be interpreted.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// The raw value received from upstream.
        value: String,
        /// Description of what's wrong.
        reason: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
