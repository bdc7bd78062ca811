//! Live mode: subscription lifecycle, reorder buffer and watermark.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   StreamEvent    ┌──────────────────────┐
//! │   Subscription   │ ───────────────▶ │  WatermarkScheduler  │
//! │ (upstream push)  │   drained before │  ┌────────────────┐  │
//! └──────────────────┘   every flush    │  │ ReorderBuffer  │  │
//!                                       │  └────────────────┘  │
//!                                       └──────────┬───────────┘
//!                                                  │ window / tick
//!                                                  ▼
//!                                              LiveBatch
//! ```
//!
//! The session is a small state machine: `Idle → Streaming → TornDown`.
//! There is no way back; teardown is terminal and idempotent.

mod reorder;
mod watermark;

pub use reorder::ReorderBuffer;
pub use watermark::{LiveBatch, LiveStats, PushOutcome, WatermarkScheduler};

use crate::config::ReaderConfig;
use crate::normalize::RawItem;
use crate::query::Query;
use crate::upstream::{Poll, StreamEvent, Subscription, UpstreamClient};
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use metrics::counter;
use tokio::time::Instant;

/// Lifecycle of a live session.
#[derive(Debug)]
pub enum LiveState {
    /// Constructed, no subscription yet.
    Idle,
    /// Subscription open (or ended by the producer; buffering continues).
    Streaming(Subscription),
    /// Torn down; no further calls are served.
    TornDown,
}

impl LiveState {
    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming(_) => "streaming",
            Self::TornDown => "torn-down",
        }
    }
}

/// A live read: one subscription feeding one watermark scheduler.
#[derive(Debug)]
pub struct LiveSession {
    state: LiveState,
    scheduler: WatermarkScheduler,
    anchor_time: DateTime<Utc>,
    anchor_instant: Instant,
    stream_errors: usize,
    end_logged: bool,
}

impl LiveSession {
    /// Create an idle session anchored at `now`.
    pub fn new(now: DateTime<Utc>, config: &ReaderConfig) -> Self {
        Self {
            state: LiveState::Idle,
            scheduler: WatermarkScheduler::from_config(now, config),
            anchor_time: now,
            anchor_instant: Instant::now(),
            stream_errors: 0,
            end_logged: false,
        }
    }

    /// Open the upstream subscription (`Idle → Streaming`).
    ///
    /// Calling `start` on an already streaming session is a no-op.
    pub async fn start(&mut self, client: &dyn UpstreamClient, query: &Query) -> Result<()> {
        match self.state {
            LiveState::Idle => {}
            LiveState::Streaming(_) => {
                tracing::debug!("live session already streaming");
                return Ok(());
            }
            LiveState::TornDown => return Err(Error::TornDown),
        }

        tracing::debug!("starting streaming from {} for {:?}", client.name(), query.as_str());
        let subscription = client.subscribe(query).await?;
        self.state = LiveState::Streaming(subscription);
        tracing::info!(watermark = %self.scheduler.watermark(), "live subscription open");
        Ok(())
    }

    /// Admit a pushed item directly.
    pub fn on_push(&mut self, item: &RawItem) -> Result<PushOutcome> {
        self.ensure_live()?;
        Ok(self.scheduler.on_push(item))
    }

    /// Apply one subscription event.
    pub fn handle_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Data(item) => {
                self.scheduler.on_push(&item);
            }
            StreamEvent::Error(error) => {
                // Transport errors never tear the session down.
                self.stream_errors += 1;
                counter!("live_stream_errors_total").increment(1);
                tracing::error!("live stream error: {}", error);
            }
        }
    }

    /// Move every event already waiting on the subscription into the buffer.
    ///
    /// Returns the number of events applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0usize;
        loop {
            let LiveState::Streaming(subscription) = &mut self.state else {
                return applied;
            };
            match subscription.poll() {
                Poll::Event(event) => {
                    self.handle_event(event);
                    applied += 1;
                }
                Poll::Empty => return applied,
                Poll::Closed => {
                    self.log_stream_end();
                    return applied;
                }
            }
        }
    }

    /// Wait for the next subscription event.
    ///
    /// Never resolves while idle or after the stream has ended, so it can sit
    /// in a `select!` next to a ticker.
    pub async fn next_event(&mut self) -> StreamEvent {
        if let LiveState::Streaming(subscription) = &mut self.state
            && let Some(event) = subscription.recv().await
        {
            return event;
        }
        self.log_stream_end();
        std::future::pending().await
    }

    /// Flush the window `[from, to)`, draining pending events first.
    pub fn read(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<LiveBatch> {
        self.ensure_live()?;
        self.drain();
        Ok(self.scheduler.on_window_request(from, to, limit))
    }

    /// Advance the watermark to the session clock minus the configured lag.
    pub fn tick(&mut self) -> Result<LiveBatch> {
        let now = self.now();
        self.tick_at(now)
    }

    /// Advance the watermark to `now` minus the configured lag.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Result<LiveBatch> {
        self.ensure_live()?;
        self.drain();
        Ok(self.scheduler.tick(now))
    }

    /// Close the subscription and refuse further calls. Idempotent.
    pub fn teardown(&mut self) {
        tracing::debug!("in teardown: stream {}", self.state.name());
        // Dropping the subscription closes it.
        self.state = LiveState::TornDown;
    }

    /// The session clock: the construction-time `now` advanced by elapsed
    /// monotonic time.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor_instant.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_time
            .checked_add_signed(elapsed)
            .unwrap_or(self.anchor_time)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &LiveState {
        &self.state
    }

    /// The watermark scheduler.
    pub fn scheduler(&self) -> &WatermarkScheduler {
        &self.scheduler
    }

    /// Number of transport errors reported by the subscription.
    pub fn stream_errors(&self) -> usize {
        self.stream_errors
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            LiveState::TornDown => Err(Error::TornDown),
            _ => Ok(()),
        }
    }

    fn log_stream_end(&mut self) {
        if !self.end_logged && matches!(self.state, LiveState::Streaming(_)) {
            self.end_logged = true;
            tracing::warn!(
                buffered = self.scheduler.buffered(),
                "live subscription ended; buffered records are still released"
            );
        }
    }
}
