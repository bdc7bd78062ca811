//! Core types, time helpers, and shared utilities for the murmur connector.
//!
//! This crate provides:
//! - The canonical [`Record`] emitted downstream (time, author, text)
//! - Parsing and quantization of upstream creation timestamps
//! - Prometheus metrics helpers
//! - Tracing initialisation
//! - Shared error types

mod error;
pub mod logging;
pub mod metrics;
mod record;
pub mod time;

pub use error::{Error, Result};
pub use record::Record;
pub use time::{epoch, parse_created_at, quantize_to_second};
