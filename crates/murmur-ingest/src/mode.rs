//! Mode selection.
//!
//! A read instance serves exactly one of two regimes, fixed once at
//! construction:
//!
//! ```text
//!   from = epoch   to = now (or unset)   → Historical
//!   from = now     to = end              → Streaming
//!   anything else                        → InvalidOptionCombination
//! ```
//!
//! A live subscription cannot answer historical windows and a search backfill
//! cannot follow the live edge, so straddling ranges are rejected outright.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use murmur_core::epoch;
use std::fmt;

/// One end of a requested read range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// A concrete instant.
    At(DateTime<Utc>),
    /// The unbounded end of time (live reads).
    End,
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(time: DateTime<Utc>) -> Self {
        Self::At(time)
    }
}

/// The regime a read instance operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// One-shot paginated backfill ending in an end-of-data signal.
    Historical,
    /// Continuous live subscription, ended only by teardown.
    Streaming,
}

impl ReadMode {
    /// Returns `true` for [`ReadMode::Streaming`].
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Historical => f.write_str("historical"),
            Self::Streaming => f.write_str("streaming"),
        }
    }
}

/// Decide the read mode for a requested `[from, to)` range.
///
/// Unset bounds default to `now`.
pub fn select_mode(
    from: Option<TimeBound>,
    to: Option<TimeBound>,
    now: DateTime<Utc>,
) -> Result<ReadMode> {
    let from = from.unwrap_or(TimeBound::At(now));
    let to = to.unwrap_or(TimeBound::At(now));

    match (from, to) {
        (TimeBound::At(from), TimeBound::At(to)) if from == epoch() && to == now => {
            Ok(ReadMode::Historical)
        }
        (TimeBound::At(from), TimeBound::End) if from == now => Ok(ReadMode::Streaming),
        _ => Err(Error::InvalidOptionCombination {
            option: "from/to",
            rule: "pure historical or pure live",
        }),
    }
}
