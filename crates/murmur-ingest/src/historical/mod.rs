//! Historical mode: paginated search backfill.
//!
//! The search endpoint pages newest-first and its `max_id` cursor is
//! inclusive, so every page after the first starts with the item that ended
//! the previous page. The paginator compensates by requesting one extra item
//! and discarding the first, accumulates pages until the upstream runs dry or
//! the limit is reached, and only then reverses the whole buffer into
//! chronological order.
//!
//! ```text
//!   Init ──page──▶ Fetching(max_id) ──page──▶ … ──empty/limit──▶ Done ──take──▶ Emitted
//!     └────────────────┴──────── fetch failed after retries ────▶ Failed
//! ```

mod fetch;
mod paginator;

pub use fetch::fetch_page;
pub use paginator::{HistoricalBatch, HistoricalPaginator, HistoricalStats, PaginatorState};
