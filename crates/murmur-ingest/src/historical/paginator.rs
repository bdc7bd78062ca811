//! Cursor-driven search pagination.

use super::fetch::fetch_page;
use crate::config::ReaderConfig;
use crate::normalize::{RawItem, normalize};
use crate::query::Query;
use crate::upstream::{MaxId, SearchRequest, UpstreamClient};
use crate::{Error, Result};
use metrics::counter;
use murmur_core::Record;

/// Pagination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginatorState {
    /// No page fetched yet.
    Init,
    /// At least one page fetched; continue below `max_id`.
    Fetching { max_id: MaxId },
    /// Upstream exhausted or limit reached; points not yet taken.
    Done,
    /// Points handed out; terminal.
    Emitted,
    /// A fetch failed for good; terminal.
    Failed { reason: String },
}

impl PaginatorState {
    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Fetching { .. } => "fetching",
            Self::Done => "done",
            Self::Emitted => "emitted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// The result of a historical read.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalBatch {
    /// Records in ascending time order.
    pub points: Vec<Record>,
    /// Always `true`: a historical read is one-shot.
    pub eof: bool,
}

/// Counters for the historical path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalStats {
    /// Search pages received.
    pub pages: usize,
    /// Raw items appended to the buffer (after cursor dedup).
    pub items_buffered: usize,
    /// Cursor duplicates discarded.
    pub duplicates_dropped: usize,
    /// Buffered items dropped by the normalizer at emit time.
    pub malformed: usize,
    /// Records emitted.
    pub emitted: usize,
}

/// Accumulates search pages for one historical read.
///
/// The transitions ([`next_request`](Self::next_request),
/// [`on_page`](Self::on_page), [`on_failure`](Self::on_failure),
/// [`take_points`](Self::take_points)) do no I/O; [`run`](Self::run) drives
/// them against an [`UpstreamClient`].
#[derive(Debug)]
pub struct HistoricalPaginator {
    query: Query,
    limit: usize,
    fetch_size: usize,
    state: PaginatorState,
    buffer: Vec<RawItem>,
    stats: HistoricalStats,
}

impl HistoricalPaginator {
    /// Create a paginator emitting at most `limit` records, `fetch_size` per page.
    pub fn new(query: Query, limit: usize, fetch_size: usize) -> Self {
        let state = if limit == 0 {
            PaginatorState::Done
        } else {
            PaginatorState::Init
        };

        Self {
            query,
            limit,
            fetch_size,
            state,
            buffer: Vec::new(),
            stats: HistoricalStats::default(),
        }
    }

    /// Create a paginator from reader configuration.
    pub fn from_config(query: Query, config: &ReaderConfig) -> Self {
        Self::new(query, config.limit, config.fetch_size)
    }

    /// The request for the next page, or `None` if no more pages are needed.
    ///
    /// When continuing from a cursor the count is one higher than the
    /// remaining capacity, because the first item returned repeats the
    /// cursor item.
    pub fn next_request(&self) -> Option<SearchRequest> {
        let max_id = match &self.state {
            PaginatorState::Init => None,
            PaginatorState::Fetching { max_id } => Some(max_id.clone()),
            _ => return None,
        };

        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }

        let mut count = self.fetch_size.min(remaining);
        if max_id.is_some() {
            count += 1;
        }

        Some(SearchRequest {
            query: self.query.as_str().to_string(),
            count,
            max_id,
        })
    }

    /// Apply a page returned for [`next_request`](Self::next_request).
    pub fn on_page(&mut self, mut page: Vec<RawItem>) {
        let cursor = match &self.state {
            PaginatorState::Init => None,
            PaginatorState::Fetching { max_id } => Some(max_id.clone()),
            other => {
                tracing::debug!("ignoring page received in state {}", other.name());
                return;
            }
        };

        self.stats.pages += 1;
        counter!("historical_pages_total").increment(1);
        tracing::debug!("search returned {} items", page.len());

        if let Some(cursor) = &cursor
            && !page.is_empty()
        {
            let duplicate = page.remove(0);
            self.stats.duplicates_dropped += 1;
            if duplicate.cursor_id().as_ref() != Some(cursor) {
                tracing::debug!(
                    max_id = %cursor,
                    "first item of continued page does not match cursor, dropped anyway"
                );
            }
        }

        page.truncate(self.remaining());
        if page.is_empty() {
            self.state = PaginatorState::Done;
            return;
        }

        let last_id = page.last().and_then(RawItem::cursor_id);
        self.stats.items_buffered += page.len();
        self.buffer.append(&mut page);
        tracing::debug!("buffered {} items total", self.buffer.len());

        if self.buffer.len() >= self.limit {
            tracing::warn!("reached limit of {} items, stopping search", self.limit);
            self.state = PaginatorState::Done;
            return;
        }

        self.state = match last_id {
            Some(max_id) => PaginatorState::Fetching { max_id },
            None => {
                tracing::warn!("last item of page has no id, stopping search");
                PaginatorState::Done
            }
        };
    }

    /// Mark the read as failed.
    pub fn on_failure(&mut self, error: &Error) {
        tracing::error!(
            buffered = self.buffer.len(),
            "historical read failed: {}",
            error
        );
        self.buffer.clear();
        self.state = PaginatorState::Failed {
            reason: error.to_string(),
        };
    }

    /// Hand out the accumulated records in chronological order.
    ///
    /// The buffer is consumed: reversed (pages arrive newest-first),
    /// normalized with unusable items dropped, and discarded. Returns an
    /// empty vector if called before completion or a second time.
    pub fn take_points(&mut self) -> Vec<Record> {
        if self.state != PaginatorState::Done {
            return Vec::new();
        }

        let buffered = std::mem::take(&mut self.buffer);
        let total = buffered.len();
        let points: Vec<Record> = buffered.iter().rev().filter_map(normalize).collect();

        self.stats.malformed += total - points.len();
        self.stats.emitted += points.len();
        self.state = PaginatorState::Emitted;

        counter!("ingest_items_total").increment(total as u64);
        counter!("ingest_items_malformed_total").increment((total - points.len()) as u64);
        counter!("historical_records_emitted_total").increment(points.len() as u64);
        tracing::debug!("all done, emitting {} records", points.len());

        points
    }

    /// Fetch pages until done, then return every record.
    ///
    /// A read that has already completed returns an empty batch; a read that
    /// has failed returns [`Error::ReadFailed`] again.
    pub async fn run(
        &mut self,
        client: &dyn UpstreamClient,
        config: &ReaderConfig,
    ) -> Result<HistoricalBatch> {
        while let Some(request) = self.next_request() {
            tracing::debug!(
                buffered = self.buffer.len(),
                max_id = ?request.max_id.as_ref().map(MaxId::as_str),
                count = request.count,
                "search"
            );

            match fetch_page(client, &request, config).await {
                Ok(page) => self.on_page(page),
                Err(e) => {
                    self.on_failure(&e);
                    return Err(Error::ReadFailed(e.to_string()));
                }
            }
        }

        if let PaginatorState::Failed { reason } = &self.state {
            return Err(Error::ReadFailed(reason.clone()));
        }

        Ok(HistoricalBatch {
            points: self.take_points(),
            eof: true,
        })
    }

    /// Current state.
    pub fn state(&self) -> &PaginatorState {
        &self.state
    }

    /// Number of raw items accumulated so far.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Historical-path counters.
    pub fn stats(&self) -> &HistoricalStats {
        &self.stats
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn item(id: u64) -> RawItem {
        let created_at = DateTime::from_timestamp(1_600_000_000 + id as i64, 0)
            .unwrap()
            .format(murmur_core::time::CREATED_AT_FORMAT)
            .to_string();
        RawItem::new(id.to_string(), created_at, "search", format!("#{id}"))
    }

    fn page(ids: &[u64]) -> Vec<RawItem> {
        ids.iter().copied().map(item).collect()
    }

    fn paginator(limit: usize, fetch_size: usize) -> HistoricalPaginator {
        HistoricalPaginator::new(Query::new("rust").unwrap(), limit, fetch_size)
    }

    fn ids(points: &[Record]) -> Vec<String> {
        points.iter().map(|r| r.text().trim_start_matches('#').to_string()).collect()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    #[test]
    fn test_first_request_has_no_cursor() {
        let paginator = paginator(1000, 100);
        let request = paginator.next_request().unwrap();
        assert_eq!(request.query, "rust");
        assert_eq!(request.count, 100);
        assert!(request.max_id.is_none());
    }

    #[test]
    fn test_first_request_capped_by_limit() {
        let paginator = paginator(5, 100);
        assert_eq!(paginator.next_request().unwrap().count, 5);
    }

    #[test]
    fn test_cursor_request_asks_for_one_extra() {
        let mut paginator = paginator(5, 3);
        paginator.on_page(page(&[10, 9, 8]));

        let request = paginator.next_request().unwrap();
        assert_eq!(request.max_id, Some(MaxId::new("8")));
        // min(3, 5 - 3) + 1
        assert_eq!(request.count, 3);
    }

    // =========================================================================
    // Pages
    // =========================================================================

    #[test]
    fn test_limit_five_fetch_three() {
        let mut paginator = paginator(5, 3);

        paginator.on_page(page(&[10, 9, 8]));
        assert_eq!(paginator.buffered(), 3);

        paginator.on_page(page(&[8, 7, 6]));
        assert_eq!(paginator.buffered(), 5);
        assert_eq!(paginator.state(), &PaginatorState::Done);
        assert!(paginator.next_request().is_none());

        let points = paginator.take_points();
        assert_eq!(points.len(), 5);
        assert_eq!(ids(&points), vec!["6", "7", "8", "9", "10"]);
        assert!(points.windows(2).all(|w| w[0].time() < w[1].time()));
        assert_eq!(paginator.stats().duplicates_dropped, 1);
    }

    #[test]
    fn test_only_first_item_of_continued_page_is_dropped() {
        let mut paginator = paginator(100, 3);
        paginator.on_page(page(&[20, 19, 18]));
        paginator.on_page(page(&[18, 17, 16, 15]));
        paginator.on_page(page(&[15]));

        assert_eq!(paginator.state(), &PaginatorState::Done);
        let points = paginator.take_points();
        assert_eq!(ids(&points), vec!["15", "16", "17", "18", "19", "20"]);
        assert_eq!(paginator.stats().pages, 3);
        assert_eq!(paginator.stats().duplicates_dropped, 2);
    }

    #[test]
    fn test_empty_first_page_is_done() {
        let mut paginator = paginator(100, 10);
        paginator.on_page(Vec::new());

        assert_eq!(paginator.state(), &PaginatorState::Done);
        assert!(paginator.take_points().is_empty());
        assert_eq!(paginator.state(), &PaginatorState::Emitted);
    }

    #[test]
    fn test_oversized_page_is_truncated_to_limit() {
        let mut paginator = paginator(4, 10);
        paginator.on_page(page(&[9, 8, 7, 6, 5, 4]));

        assert_eq!(paginator.buffered(), 4);
        assert_eq!(ids(&paginator.take_points()), vec!["6", "7", "8", "9"]);
    }

    #[test]
    fn test_page_without_cursor_id_stops() {
        let mut paginator = paginator(100, 2);
        let mut last = item(4);
        last.id_str = None;
        paginator.on_page(vec![item(5), last]);

        assert_eq!(paginator.state(), &PaginatorState::Done);
        assert_eq!(paginator.take_points().len(), 2);
    }

    #[test]
    fn test_malformed_items_dropped_at_emit() {
        let mut paginator = paginator(100, 10);
        let mut broken = item(2);
        broken.created_at = None;
        paginator.on_page(vec![item(3), broken, item(1)]);
        paginator.on_page(Vec::new());

        let points = paginator.take_points();
        assert_eq!(ids(&points), vec!["1", "3"]);
        assert_eq!(paginator.stats().malformed, 1);
        assert_eq!(paginator.stats().emitted, 2);
    }

    #[test]
    fn test_zero_limit_is_done_immediately() {
        let mut paginator = paginator(0, 10);
        assert!(paginator.next_request().is_none());
        assert!(paginator.take_points().is_empty());
    }

    #[test]
    fn test_take_points_once() {
        let mut paginator = paginator(2, 2);
        paginator.on_page(page(&[2, 1]));

        assert_eq!(paginator.take_points().len(), 2);
        assert!(paginator.take_points().is_empty());
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut paginator = paginator(10, 2);
        paginator.on_page(page(&[9, 8]));
        paginator.on_failure(&Error::Upstream("rate limited".to_string()));

        assert_eq!(paginator.state().name(), "failed");
        assert!(paginator.next_request().is_none());
        assert!(paginator.take_points().is_empty());
        assert_eq!(paginator.buffered(), 0);
    }
}
