//! Typed query value.

use crate::{Error, Result};
use std::fmt;

/// An already-compiled upstream query string.
///
/// The filter compiler lives outside this crate; this type only guarantees
/// the string is present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    /// Wrap a compiled query, rejecting blank input.
    pub fn new(compiled: impl Into<String>) -> Result<Self> {
        let compiled = compiled.into();
        let trimmed = compiled.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingFilter);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The query string as sent upstream.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
