//! Rate-limited warnings.
//!
//! Late arrivals and buffer overflows can happen thousands of times a second
//! during a burst. A [`ThrottledWarning`] logs at most once per cooldown
//! window and reports how many occurrences it swallowed in between.

use metrics::counter;
use std::time::{Duration, Instant};

/// Default cooldown between two emitted warnings of the same kind.
pub const DEFAULT_WARNING_COOLDOWN: Duration = Duration::from_secs(10);

/// A warning that is emitted at most once per cooldown window.
#[derive(Debug)]
pub struct ThrottledWarning {
    kind: &'static str,
    context: String,
    cooldown: Duration,
    last_emitted: Option<Instant>,
    suppressed_since_emit: u64,
    emitted: u64,
    suppressed: u64,
}

impl ThrottledWarning {
    /// Create a warning of the given kind, e.g. `POINTS-ARRIVED-LATE`.
    ///
    /// `context` is included in every emitted line (e.g. `proc: read twitter`).
    pub fn new(kind: &'static str, context: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            kind,
            context: context.into(),
            cooldown,
            last_emitted: None,
            suppressed_since_emit: 0,
            emitted: 0,
            suppressed: 0,
        }
    }

    /// Record an occurrence now. Returns `true` if a warning was logged.
    pub fn trigger(&mut self) -> bool {
        self.trigger_at(Instant::now())
    }

    /// Record an occurrence at `now`. Returns `true` if a warning was logged.
    pub fn trigger_at(&mut self, now: Instant) -> bool {
        let due = match self.last_emitted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        };

        if !due {
            self.suppressed_since_emit += 1;
            self.suppressed += 1;
            counter!("throttled_warnings_suppressed_total", "kind" => self.kind).increment(1);
            return false;
        }

        tracing::warn!(
            kind = self.kind,
            context = %self.context,
            suppressed = self.suppressed_since_emit,
            "{} ({}), {} more since last warning",
            self.kind,
            self.context,
            self.suppressed_since_emit
        );
        counter!("throttled_warnings_emitted_total", "kind" => self.kind).increment(1);

        self.last_emitted = Some(now);
        self.suppressed_since_emit = 0;
        self.emitted += 1;
        true
    }

    /// The warning kind.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Number of warnings actually logged.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Number of occurrences swallowed by the cooldown.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
