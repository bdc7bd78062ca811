//! The canonical record handed to the downstream engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized, timestamped record.
///
/// `time` is always the upstream item's creation time, never the time the
/// item arrived. Records are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    time: DateTime<Utc>,
    author: String,
    text: String,
}

impl Record {
    /// Build a record from already-normalized parts.
    pub fn new(time: DateTime<Utc>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            time,
            author: author.into(),
            text: text.into(),
        }
    }

    /// Creation time of the upstream item.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Author handle, including the leading `@`.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Body text, exactly as received.
    pub fn text(&self) -> &str {
        &self.text
    }
}
