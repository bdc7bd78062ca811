//! Timestamp helpers.
//!
//! The upstream search/stream API reports creation times in its own textual
//! format (`Wed Oct 10 20:19:24 +0000 2018`). Some proxies re-encode the field
//! as RFC 3339, so both are accepted.

use crate::{Error, Result};
use chrono::{DateTime, SubsecRound, Utc};

/// Native upstream creation-time format.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// The start of time for historical reads (`1970-01-01T00:00:00Z`).
pub fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Parse an upstream creation-time string into an absolute timestamp.
pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_str(trimmed, CREATED_AT_FORMAT) {
        return Ok(parsed.with_timezone(&Utc));
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| Error::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Round a timestamp down to whole-second resolution.
pub fn quantize_to_second(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(0)
}
