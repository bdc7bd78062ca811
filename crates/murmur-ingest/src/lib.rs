//! Search/stream source connector core.
//!
//! Turns an upstream social search API into a time-ordered stream of
//! [`Record`](murmur_core::Record)s for a host dataflow engine. A read is
//! fixed into one of two modes when it is constructed:
//!
//! - **Historical**: `[epoch, now)`. Search pages are fetched newest-first
//!   behind an inclusive `max_id` cursor, deduplicated, capped at `limit`,
//!   and emitted once in ascending time order with an end-of-data signal.
//! - **Streaming**: `[now, end)`. A live subscription feeds a bounded
//!   reorder buffer; records are released in time order once the watermark
//!   passes them. Late and overflowing records are dropped with throttled
//!   warnings.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────┐
//!   ReadParams ──▶│  select_mode  │
//!                 └───────┬───────┘
//!            historical   │   streaming
//!          ┌──────────────┴──────────────┐
//!          ▼                             ▼
//! ┌────────────────────┐      ┌──────────────────────┐
//! │ HistoricalPaginator│      │     LiveSession      │
//! │  search → dedup →  │      │ Subscription ─▶      │
//! │  cap → reverse     │      │ WatermarkScheduler   │
//! └─────────┬──────────┘      │  └ ReorderBuffer     │
//!           │                 └──────────┬───────────┘
//!           ▼                            ▼
//!   HistoricalBatch { eof }      LiveBatch { read_end }
//! ```
//!
//! Both paths normalize through [`normalize`](normalize::normalize) and talk
//! to upstream only through an injected [`UpstreamClient`].

pub mod config;
pub mod error;
pub mod historical;
pub mod live;
pub mod mode;
pub mod normalize;
pub mod query;
pub mod read;
pub mod throttle;
pub mod upstream;

pub use config::ReaderConfig;
pub use error::{Error, Result};
pub use historical::{HistoricalBatch, HistoricalPaginator, PaginatorState};
pub use live::{LiveBatch, LiveSession, PushOutcome, WatermarkScheduler};
pub use mode::{ReadMode, TimeBound, select_mode};
pub use normalize::{RawItem, RawUser, normalize};
pub use query::Query;
pub use read::{ReadOutput, ReadParams, ReadStats, SearchRead};
pub use throttle::ThrottledWarning;
pub use upstream::{MaxId, SearchRequest, StreamEvent, Subscription, UpstreamClient};
