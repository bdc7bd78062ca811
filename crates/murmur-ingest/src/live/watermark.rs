//! Watermark scheduling over the reorder buffer.
//!
//! The watermark is the boundary below which live records are neither
//! accepted nor released any more. It starts at the quantized construction
//! time and only moves forward:
//!
//! ```text
//!   push(t < watermark)      → late, dropped
//!   push(t >= watermark)     → buffered (unless the buffer is full)
//!   window(_, to)            → release every buffered t < to, watermark = to
//!   tick(now)                → window(watermark, quantize(now) - lag)
//! ```

use super::reorder::ReorderBuffer;
use crate::config::ReaderConfig;
use crate::normalize::{RawItem, normalize};
use crate::throttle::ThrottledWarning;
use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, gauge};
use murmur_core::{Record, quantize_to_second};
use std::time::Duration;

/// What happened to a pushed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Accepted into the reorder buffer.
    Buffered,
    /// Older than the watermark; dropped.
    Late,
    /// Buffer at capacity; dropped.
    Overflow,
    /// Not normalizable; dropped silently.
    Malformed,
}

/// Records released by one window flush.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveBatch {
    /// Released records in non-decreasing time order.
    pub points: Vec<Record>,
    /// The watermark after the flush; the caller resumes from here.
    pub read_end: DateTime<Utc>,
}

/// Counters for the live path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveStats {
    /// Raw items pushed.
    pub items_seen: usize,
    /// Items dropped by the normalizer.
    pub malformed: usize,
    /// Records dropped for arriving behind the watermark.
    pub late: usize,
    /// Records dropped because the buffer was full.
    pub overflow: usize,
    /// Records accepted into the buffer.
    pub buffered: usize,
    /// Records released by window flushes.
    pub released: usize,
}

/// Owns the reorder buffer and the watermark that gates it.
#[derive(Debug)]
pub struct WatermarkScheduler {
    buffer: ReorderBuffer,
    watermark: DateTime<Utc>,
    lag: TimeDelta,
    warn_late: ThrottledWarning,
    warn_overflow: ThrottledWarning,
    stats: LiveStats,
}

impl WatermarkScheduler {
    /// Create a scheduler whose watermark starts at `now` rounded down to
    /// the second.
    pub fn new(
        now: DateTime<Utc>,
        buffer_limit: usize,
        lag: Duration,
        warning_cooldown: Duration,
    ) -> Self {
        let watermark = quantize_to_second(now);
        gauge!("live_watermark_unix").set(watermark.timestamp() as f64);

        Self {
            buffer: ReorderBuffer::new(buffer_limit),
            watermark,
            lag: TimeDelta::from_std(lag).unwrap_or(TimeDelta::MAX),
            warn_late: ThrottledWarning::new(
                "POINTS-ARRIVED-LATE",
                "proc: read twitter",
                warning_cooldown,
            ),
            warn_overflow: ThrottledWarning::new(
                "BUFFER-LIMIT-EXCEEDED",
                "buffer: read twitter buffer",
                warning_cooldown,
            ),
            stats: LiveStats::default(),
        }
    }

    /// Create a scheduler from reader configuration.
    pub fn from_config(now: DateTime<Utc>, config: &ReaderConfig) -> Self {
        Self::new(now, config.buffer_limit, config.lag, config.warning_cooldown)
    }

    /// Normalize and admit a pushed upstream item.
    pub fn on_push(&mut self, item: &RawItem) -> PushOutcome {
        self.stats.items_seen += 1;
        counter!("ingest_items_total").increment(1);

        match normalize(item) {
            Some(record) => self.on_record(record),
            None => {
                self.stats.malformed += 1;
                counter!("ingest_items_malformed_total").increment(1);
                PushOutcome::Malformed
            }
        }
    }

    /// Admit an already-normalized record.
    pub fn on_record(&mut self, record: Record) -> PushOutcome {
        if record.time() < self.watermark {
            self.stats.late += 1;
            counter!("live_records_late_total").increment(1);
            self.warn_late.trigger();
            return PushOutcome::Late;
        }

        match self.buffer.push(record) {
            Ok(()) => {
                self.stats.buffered += 1;
                counter!("live_records_buffered_total").increment(1);
                gauge!("live_buffer_depth").set(self.buffer.len() as f64);
                tracing::trace!("buffered {} records", self.buffer.len());
                PushOutcome::Buffered
            }
            Err(_dropped) => {
                self.stats.overflow += 1;
                counter!("live_records_overflow_total").increment(1);
                self.warn_overflow.trigger();
                PushOutcome::Overflow
            }
        }
    }

    /// Release buffered records with time before `to` and advance the
    /// watermark.
    ///
    /// With `limit`, at most that many records are released; the watermark
    /// then stops at the earliest record left behind so that nothing still
    /// buffered becomes late. `from` is informational: the buffer only ever
    /// holds records at or after the current watermark.
    pub fn on_window_request(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
    ) -> LiveBatch {
        tracing::debug!(
            from = %from,
            to = %to,
            buffered = self.buffer.len(),
            "live window request"
        );

        let mut points = Vec::new();
        let mut target = to;
        while let Some(time) = self.buffer.peek_time() {
            if time >= to {
                break;
            }
            if limit.is_some_and(|max| points.len() >= max) {
                target = time;
                break;
            }
            if let Some(record) = self.buffer.pop() {
                points.push(record);
            }
        }

        self.watermark = self.watermark.max(target);
        self.stats.released += points.len();

        counter!("live_records_released_total").increment(points.len() as u64);
        gauge!("live_buffer_depth").set(self.buffer.len() as f64);
        gauge!("live_watermark_unix").set(self.watermark.timestamp() as f64);
        tracing::debug!(
            "returning {} records, watermark {}",
            points.len(),
            self.watermark
        );

        LiveBatch {
            points,
            read_end: self.watermark,
        }
    }

    /// Advance the watermark to `now` (quantized) minus the configured lag.
    ///
    /// A target at or behind the current watermark releases nothing.
    pub fn tick(&mut self, now: DateTime<Utc>) -> LiveBatch {
        let target = quantize_to_second(now)
            .checked_sub_signed(self.lag)
            .unwrap_or(self.watermark);
        self.on_window_request(self.watermark, target, None)
    }

    /// Current watermark.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Number of records waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Live-path counters.
    pub fn stats(&self) -> &LiveStats {
        &self.stats
    }

    /// The late-arrival warning.
    pub fn late_warning(&self) -> &ThrottledWarning {
        &self.warn_late
    }

    /// The buffer-overflow warning.
    pub fn overflow_warning(&self) -> &ThrottledWarning {
        &self.warn_overflow
    }
}
