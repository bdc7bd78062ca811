//! The read facade driven by the host engine.
//!
//! A [`SearchRead`] is fixed into one [`ReadMode`] at construction and owns
//! its upstream client for its whole lifetime:
//!
//! ```text
//!                    ┌──────────────── SearchRead ────────────────┐
//!  ReadParams ──────▶│ select_mode ─┬─ Historical ─▶ Paginator    │──▶ HistoricalBatch
//!  ReaderConfig      │              └─ Streaming  ─▶ LiveSession  │──▶ LiveBatch
//!  UpstreamClient ──▶│                                            │
//!                    └────────────────────────────────────────────┘
//! ```

use crate::config::ReaderConfig;
use crate::historical::{HistoricalBatch, HistoricalPaginator};
use crate::live::{LiveBatch, LiveSession, PushOutcome};
use crate::mode::{ReadMode, TimeBound, select_mode};
use crate::normalize::RawItem;
use crate::query::Query;
use crate::upstream::UpstreamClient;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

/// Construction parameters supplied by the host engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadParams {
    /// The compiled filter query.
    pub query: Query,
    /// Requested lower bound; `None` means `now`.
    pub from: Option<TimeBound>,
    /// Requested upper bound; `None` means `now`.
    pub to: Option<TimeBound>,
    /// Reference instant used for mode selection and the live watermark.
    pub now: DateTime<Utc>,
}

impl ReadParams {
    /// Parameters with both bounds unset.
    pub fn new(query: Query, now: DateTime<Utc>) -> Self {
        Self {
            query,
            from: None,
            to: None,
            now,
        }
    }

    /// Set the lower bound.
    pub fn from(mut self, from: impl Into<TimeBound>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the upper bound.
    pub fn to(mut self, to: impl Into<TimeBound>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Parameters for a full backfill: `[epoch, now)`.
    pub fn historical(query: Query, now: DateTime<Utc>) -> Self {
        Self::new(query, now).from(murmur_core::epoch()).to(now)
    }

    /// Parameters for a live read: `[now, end)`.
    pub fn streaming(query: Query, now: DateTime<Utc>) -> Self {
        Self::new(query, now).from(now).to(TimeBound::End)
    }
}

/// Output of [`SearchRead::read`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutput {
    /// A live window flush.
    Live(LiveBatch),
    /// The complete historical point set.
    Historical(HistoricalBatch),
}

impl ReadOutput {
    /// The released records.
    pub fn points(&self) -> &[murmur_core::Record] {
        match self {
            Self::Live(batch) => &batch.points,
            Self::Historical(batch) => &batch.points,
        }
    }

    /// Whether the read has no more data.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Historical(batch) if batch.eof)
    }
}

/// Statistics for a read, in either mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStats {
    /// The mode the read was fixed into.
    pub mode: ReadMode,

    /// Raw items received (pushed, or buffered from search pages).
    pub items_seen: usize,

    /// Items dropped by the normalizer.
    pub malformed: usize,

    /// Live records dropped for arriving behind the watermark.
    pub late: usize,

    /// Live records dropped because the reorder buffer was full.
    pub overflow: usize,

    /// Live records accepted into the reorder buffer.
    pub buffered: usize,

    /// Records handed to the caller.
    pub records_emitted: usize,

    /// Transport errors reported by the live subscription.
    pub stream_errors: usize,

    /// Search pages fetched.
    pub pages_fetched: usize,

    /// Cursor duplicates dropped from continued search pages.
    pub duplicates_dropped: usize,
}

impl ReadStats {
    fn empty(mode: ReadMode) -> Self {
        Self {
            mode,
            items_seen: 0,
            malformed: 0,
            late: 0,
            overflow: 0,
            buffered: 0,
            records_emitted: 0,
            stream_errors: 0,
            pages_fetched: 0,
            duplicates_dropped: 0,
        }
    }
}

enum Reader {
    Historical(HistoricalPaginator),
    Live(LiveSession),
}

/// A search-backed read, fixed into historical or streaming mode.
pub struct SearchRead {
    mode: ReadMode,
    query: Query,
    config: ReaderConfig,
    client: Box<dyn UpstreamClient>,
    reader: Reader,
    torn_down: bool,
}

impl std::fmt::Debug for SearchRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRead")
            .field("mode", &self.mode)
            .field("query", &self.query)
            .field("client", &self.client.name())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl SearchRead {
    /// Validate the configuration, select the mode and take ownership of
    /// the upstream client.
    ///
    /// Fails with [`Error::InvalidOptionCombination`] for a range that is
    /// neither pure historical nor pure live; nothing is allocated upstream.
    pub fn new(
        params: ReadParams,
        config: ReaderConfig,
        client: Box<dyn UpstreamClient>,
    ) -> Result<Self> {
        config.validate()?;
        let mode = select_mode(params.from, params.to, params.now)?;

        let reader = match mode {
            ReadMode::Historical => {
                Reader::Historical(HistoricalPaginator::from_config(params.query.clone(), &config))
            }
            ReadMode::Streaming => Reader::Live(LiveSession::new(params.now, &config)),
        };

        tracing::info!(
            mode = %mode,
            client = client.name(),
            query = params.query.as_str(),
            "search read created"
        );

        Ok(Self {
            mode,
            query: params.query,
            config,
            client,
            reader,
            torn_down: false,
        })
    }

    /// The mode fixed at construction.
    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// The filter query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Open the live subscription. A no-op for historical reads, whose
    /// fetching starts with the first [`read`](Self::read).
    pub async fn start(&mut self) -> Result<()> {
        self.ensure_open()?;
        match &mut self.reader {
            Reader::Historical(_) => Ok(()),
            Reader::Live(session) => session.start(self.client.as_ref(), &self.query).await,
        }
    }

    /// Serve a read call from the host engine.
    ///
    /// Live reads flush the window `[from, to)`, releasing at most `limit`
    /// records. Historical reads ignore the window and return every record
    /// up to the configured limit with `eof` set.
    pub async fn read(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<ReadOutput> {
        match self.mode {
            ReadMode::Historical => self.read_historical().await.map(ReadOutput::Historical),
            ReadMode::Streaming => self.read_live(from, to, limit).map(ReadOutput::Live),
        }
    }

    /// Run the historical read to completion.
    pub async fn read_historical(&mut self) -> Result<HistoricalBatch> {
        self.ensure_open()?;
        match &mut self.reader {
            Reader::Historical(paginator) => paginator.run(self.client.as_ref(), &self.config).await,
            Reader::Live(_) => Err(Error::WrongMode {
                operation: "historical read",
                mode: self.mode,
            }),
        }
    }

    /// Flush the live window `[from, to)`.
    pub fn read_live(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<LiveBatch> {
        self.ensure_open()?;
        self.live_mut("live read")?.read(from, to, limit)
    }

    /// Advance the live watermark by the session clock.
    pub fn tick(&mut self) -> Result<LiveBatch> {
        self.ensure_open()?;
        self.live_mut("tick")?.tick()
    }

    /// Advance the live watermark as of `now`.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Result<LiveBatch> {
        self.ensure_open()?;
        self.live_mut("tick")?.tick_at(now)
    }

    /// Admit a pushed item into the live buffer directly.
    pub fn on_push(&mut self, item: &RawItem) -> Result<PushOutcome> {
        self.ensure_open()?;
        self.live_mut("push")?.on_push(item)
    }

    /// Drive a live read on the configured tick interval.
    ///
    /// Opens the subscription if needed, then applies events as they arrive
    /// and flushes on every tick. The handler receives each batch and
    /// returns `Ok(true)` to continue, `Ok(false)` to stop, or `Err` to
    /// abort with that error.
    pub async fn run_periodic<F>(&mut self, mut handler: F) -> Result<ReadStats>
    where
        F: FnMut(LiveBatch) -> Result<bool>,
    {
        self.start().await?;

        let tick_interval = self.config.tick_interval;
        let session = self.live_mut("run_periodic")?;

        tracing::info!(
            "Starting periodic live flush (interval: {}ms)",
            tick_interval.as_millis()
        );

        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let batch = session.tick()?;
                    if !batch.points.is_empty() {
                        tracing::debug!(
                            released = batch.points.len(),
                            read_end = %batch.read_end,
                            "live flush"
                        );
                    }
                    if !handler(batch)? {
                        tracing::info!("Live handler signaled stop");
                        break;
                    }
                }
                event = session.next_event() => session.handle_event(event),
            }
        }

        Ok(self.stats())
    }

    /// Release the upstream client's live subscription and refuse further
    /// calls. Safe in any state; repeated calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Reader::Live(session) = &mut self.reader {
            session.teardown();
        }
        tracing::info!(mode = %self.mode, "search read torn down");
    }

    /// Whether [`teardown`](Self::teardown) has been called.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Statistics for this read so far.
    pub fn stats(&self) -> ReadStats {
        let mut stats = ReadStats::empty(self.mode);
        match &self.reader {
            Reader::Historical(paginator) => {
                let h = paginator.stats();
                stats.items_seen = h.items_buffered;
                stats.malformed = h.malformed;
                stats.records_emitted = h.emitted;
                stats.pages_fetched = h.pages;
                stats.duplicates_dropped = h.duplicates_dropped;
            }
            Reader::Live(session) => {
                let l = session.scheduler().stats();
                stats.items_seen = l.items_seen;
                stats.malformed = l.malformed;
                stats.late = l.late;
                stats.overflow = l.overflow;
                stats.buffered = l.buffered;
                stats.records_emitted = l.released;
                stats.stream_errors = session.stream_errors();
            }
        }
        stats
    }

    fn ensure_open(&self) -> Result<()> {
        if self.torn_down {
            return Err(Error::TornDown);
        }
        Ok(())
    }

    fn live_mut(&mut self, operation: &'static str) -> Result<&mut LiveSession> {
        match &mut self.reader {
            Reader::Live(session) => Ok(session),
            Reader::Historical(_) => Err(Error::WrongMode {
                operation,
                mode: self.mode,
            }),
        }
    }
}

impl Drop for SearchRead {
    fn drop(&mut self) {
        self.teardown();
    }
}
