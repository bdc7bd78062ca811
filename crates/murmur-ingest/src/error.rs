//! Error types for the murmur ingestion core.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing or driving a read.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested time range is neither pure historical nor pure live.
    #[error("invalid option combination for '{option}': {rule}")]
    InvalidOptionCombination {
        /// The option (or option pair) that was rejected.
        option: &'static str,
        /// The rule the combination violates.
        rule: &'static str,
    },

    /// A read was constructed without a filter query.
    #[error("read requires a filter query")]
    MissingFilter,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream API rejected or failed a call.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A single fetch exceeded the configured timeout.
    #[error("fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    /// The historical read has terminally failed.
    #[error("historical read failed: {0}")]
    ReadFailed(String),

    /// The operation belongs to the other read mode.
    #[error("{operation} is not available in {mode} mode")]
    WrongMode {
        /// The rejected operation.
        operation: &'static str,
        /// The mode the read was fixed into.
        mode: crate::mode::ReadMode,
    },

    /// The read was torn down and accepts no further calls.
    #[error("read has been torn down")]
    TornDown,

    /// Core crate error.
    #[error(transparent)]
    Core(#[from] murmur_core::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
