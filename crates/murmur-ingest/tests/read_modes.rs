//! End-to-end tests driving `SearchRead` in both modes against an in-process
//! upstream.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use murmur_core::time::CREATED_AT_FORMAT;
use murmur_ingest::{
    Error, LiveBatch, MaxId, Query, RawItem, ReadMode, ReadOutput, ReadParams, ReaderConfig,
    Result, SearchRead, SearchRequest, StreamEvent, Subscription, TimeBound, UpstreamClient,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const NOW: i64 = 1_700_000_000;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(NOW, 0).unwrap()
}

fn at(offset_secs: i64) -> DateTime<Utc> {
    now() + TimeDelta::seconds(offset_secs)
}

/// An item whose id doubles as its offset from `NOW`.
fn item(id: i64) -> RawItem {
    RawItem::new(
        id.to_string(),
        at(id).format(CREATED_AT_FORMAT).to_string(),
        "ferris",
        format!("post {id}"),
    )
}

/// Upstream fake: a newest-first timeline for search and one pre-built
/// subscription for streaming.
struct FakeUpstream {
    timeline: Vec<i64>,
    failing: bool,
    requests: Arc<Mutex<Vec<SearchRequest>>>,
    stream: Mutex<Option<Subscription>>,
}

impl FakeUpstream {
    fn search_only(mut ids: Vec<i64>) -> (Self, Arc<Mutex<Vec<SearchRequest>>>) {
        ids.sort_unstable_by(|a, b| b.cmp(a));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let fake = Self {
            timeline: ids,
            failing: false,
            requests: requests.clone(),
            stream: Mutex::new(None),
        };
        (fake, requests)
    }

    fn failing() -> (Self, Arc<Mutex<Vec<SearchRequest>>>) {
        let (mut fake, requests) = Self::search_only(Vec::new());
        fake.failing = true;
        (fake, requests)
    }

    fn streaming() -> (Self, mpsc::Sender<StreamEvent>) {
        let (tx, subscription) = Subscription::channel(64);
        let (fake, _) = Self::search_only(Vec::new());
        *fake.stream.lock() = Some(subscription);
        (fake, tx)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawItem>> {
        self.requests.lock().push(request.clone());
        if self.failing {
            return Err(Error::Upstream("503 service unavailable".to_string()));
        }

        let bound = request
            .max_id
            .as_ref()
            .map(|max_id| max_id.as_str().parse::<i64>().unwrap());

        Ok(self
            .timeline
            .iter()
            .copied()
            .filter(|id| bound.is_none_or(|b| *id <= b))
            .take(request.count)
            .map(item)
            .collect())
    }

    async fn subscribe(&self, _query: &Query) -> Result<Subscription> {
        self.stream
            .lock()
            .take()
            .ok_or_else(|| Error::Upstream("already subscribed".to_string()))
    }
}

fn query() -> Query {
    Query::new("#rustlang").unwrap()
}

fn historical(config: ReaderConfig, client: FakeUpstream) -> SearchRead {
    SearchRead::new(ReadParams::historical(query(), now()), config, Box::new(client)).unwrap()
}

fn streaming(config: ReaderConfig, client: FakeUpstream) -> SearchRead {
    SearchRead::new(ReadParams::streaming(query(), now()), config, Box::new(client)).unwrap()
}

fn offsets(points: &[murmur_core::Record]) -> Vec<i64> {
    points.iter().map(|r| r.time().timestamp() - NOW).collect()
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_blank_filter_is_missing() {
    assert!(matches!(Query::new("   "), Err(Error::MissingFilter)));
}

#[test]
fn test_mixed_range_never_subscribes() {
    let (fake, tx) = FakeUpstream::streaming();
    let params = ReadParams::new(query(), now())
        .from(murmur_core::epoch())
        .to(TimeBound::End);

    let err = SearchRead::new(params, ReaderConfig::default(), Box::new(fake)).unwrap_err();
    assert!(err.to_string().contains("pure historical or pure live"));
    // The client was dropped with its unused subscription.
    assert!(tx.is_closed());
}

// =============================================================================
// Historical mode
// =============================================================================

#[tokio::test]
async fn test_historical_limit_five_fetch_three() {
    let (fake, requests) = FakeUpstream::search_only((1..=10).collect());
    let config = ReaderConfig {
        limit: 5,
        fetch_size: 3,
        ..Default::default()
    };
    let mut read = historical(config, fake);
    assert_eq!(read.mode(), ReadMode::Historical);

    let output = read.read(now(), now(), None).await.unwrap();
    assert!(output.is_eof());
    assert_eq!(offsets(output.points()), vec![6, 7, 8, 9, 10]);

    let requests = requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].count, 3);
    assert_eq!(requests[0].max_id, None);
    assert_eq!(requests[1].count, 3);
    assert_eq!(requests[1].max_id, Some(MaxId::new("8")));
}

#[tokio::test]
async fn test_historical_exhaustion_dedups_and_orders() {
    let (fake, requests) = FakeUpstream::search_only((1..=7).collect());
    let config = ReaderConfig {
        fetch_size: 3,
        ..Default::default()
    };
    let mut read = historical(config, fake);

    let batch = read.read_historical().await.unwrap();
    assert!(batch.eof);
    assert_eq!(offsets(&batch.points), vec![1, 2, 3, 4, 5, 6, 7]);
    assert!(batch.points.iter().all(|r| r.author() == "@ferris"));

    // [7,6,5] then [5,4,3,2] then [2,1] then [1]
    assert_eq!(requests.lock().len(), 4);

    let stats = read.stats();
    assert_eq!(stats.pages_fetched, 4);
    assert_eq!(stats.duplicates_dropped, 3);
    assert_eq!(stats.records_emitted, 7);
}

#[tokio::test]
async fn test_historical_read_is_one_shot() {
    let (fake, requests) = FakeUpstream::search_only((1..=4).collect());
    let mut read = historical(ReaderConfig::default(), fake);

    assert_eq!(read.read_historical().await.unwrap().points.len(), 4);

    let again = read.read_historical().await.unwrap();
    assert!(again.eof);
    assert!(again.points.is_empty());
    assert_eq!(requests.lock().len(), 2);
}

#[tokio::test]
async fn test_historical_zero_limit_never_fetches() {
    let (fake, requests) = FakeUpstream::search_only((1..=4).collect());
    let config = ReaderConfig {
        limit: 0,
        ..Default::default()
    };
    let mut read = historical(config, fake);

    let batch = read.read_historical().await.unwrap();
    assert!(batch.eof);
    assert!(batch.points.is_empty());
    assert!(requests.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_historical_failure_is_terminal() {
    let (fake, requests) = FakeUpstream::failing();
    let config = ReaderConfig {
        fetch_retries: 1,
        retry_backoff: Duration::from_millis(10),
        ..Default::default()
    };
    let mut read = historical(config, fake);

    let err = read.read_historical().await.unwrap_err();
    assert!(matches!(err, Error::ReadFailed(_)));
    assert!(err.to_string().contains("503"));
    assert_eq!(requests.lock().len(), 2);

    assert!(matches!(read.read_historical().await, Err(Error::ReadFailed(_))));
    assert_eq!(requests.lock().len(), 2);
}

// =============================================================================
// Streaming mode
// =============================================================================

#[tokio::test]
async fn test_streaming_window_flush() {
    let (fake, tx) = FakeUpstream::streaming();
    let mut read = streaming(ReaderConfig::default(), fake);
    assert_eq!(read.mode(), ReadMode::Streaming);
    read.start().await.unwrap();

    for id in [5, 1, 3, -1] {
        tx.send(StreamEvent::Data(item(id))).await.unwrap();
    }
    tx.send(StreamEvent::Error("connection reset".to_string()))
        .await
        .unwrap();

    let output = read.read(now(), at(4), None).await.unwrap();
    let ReadOutput::Live(batch) = output else {
        panic!("expected a live batch");
    };
    assert_eq!(offsets(&batch.points), vec![1, 3]);
    assert_eq!(batch.read_end, at(4));

    let batch = read.read_live(batch.read_end, at(10), None).unwrap();
    assert_eq!(offsets(&batch.points), vec![5]);
    assert_eq!(batch.read_end, at(10));

    let stats = read.stats();
    assert_eq!(stats.items_seen, 4);
    assert_eq!(stats.late, 1);
    assert_eq!(stats.records_emitted, 3);
    assert_eq!(stats.stream_errors, 1);
}

#[tokio::test]
async fn test_streaming_limit_resumes_at_first_unreleased() {
    let (fake, tx) = FakeUpstream::streaming();
    let mut read = streaming(ReaderConfig::default(), fake);
    read.start().await.unwrap();

    for id in [2, 4, 6] {
        tx.send(StreamEvent::Data(item(id))).await.unwrap();
    }

    let first = read.read_live(now(), at(10), Some(2)).unwrap();
    assert_eq!(offsets(&first.points), vec![2, 4]);
    assert_eq!(first.read_end, at(6));

    let rest = read.read_live(first.read_end, at(10), None).unwrap();
    assert_eq!(offsets(&rest.points), vec![6]);
    assert_eq!(rest.read_end, at(10));
}

#[tokio::test]
async fn test_streaming_accepts_json_payloads() {
    let (fake, tx) = FakeUpstream::streaming();
    let mut read = streaming(ReaderConfig::default(), fake);
    read.start().await.unwrap();

    let json = format!(
        r#"{{"id_str":"1","created_at":"{}","user":{{"screen_name":"ferris"}},"text":"hi","lang":"en"}}"#,
        at(1).format(CREATED_AT_FORMAT)
    );
    tx.send(StreamEvent::Data(RawItem::from_json(&json).unwrap()))
        .await
        .unwrap();
    tx.send(StreamEvent::Data(RawItem::from_json(r#"{"id_str":"2"}"#).unwrap()))
        .await
        .unwrap();

    let batch = read.read_live(now(), at(2), None).unwrap();
    assert_eq!(batch.points.len(), 1);
    assert_eq!(batch.points[0].author(), "@ferris");
    assert_eq!(batch.points[0].text(), "hi");
    assert_eq!(read.stats().malformed, 1);
}

#[tokio::test]
async fn test_streaming_teardown_closes_subscription() {
    let (fake, tx) = FakeUpstream::streaming();
    let mut read = streaming(ReaderConfig::default(), fake);
    read.start().await.unwrap();
    assert!(!tx.is_closed());

    read.teardown();
    assert!(tx.is_closed());
    assert!(matches!(read.read(now(), at(1), None).await, Err(Error::TornDown)));

    read.teardown();
    assert!(read.is_torn_down());
}

#[tokio::test(start_paused = true)]
async fn test_run_periodic_releases_after_lag() {
    murmur_core::logging::try_init("murmur_ingest=debug");

    let (fake, tx) = FakeUpstream::streaming();
    let config = ReaderConfig {
        tick_interval: Duration::from_secs(1),
        lag: Duration::from_secs(2),
        ..Default::default()
    };
    let mut read = streaming(config, fake);

    for id in [3, 1, 2] {
        tx.send(StreamEvent::Data(item(id))).await.unwrap();
    }

    let mut batches: Vec<LiveBatch> = Vec::new();
    let stats = read
        .run_periodic(|batch| {
            batches.push(batch);
            let released: usize = batches.iter().map(|b| b.points.len()).sum();
            Ok(released < 3 && batches.len() < 30)
        })
        .await
        .unwrap();

    let released: Vec<i64> = batches.iter().flat_map(|b| offsets(&b.points)).collect();
    assert_eq!(released, vec![1, 2, 3]);
    assert!(batches.windows(2).all(|w| w[0].read_end <= w[1].read_end));
    // The last record needs the clock at now + 3 + lag.
    assert_eq!(batches.last().unwrap().read_end, at(4));
    assert_eq!(stats.records_emitted, 3);
    assert_eq!(stats.mode, ReadMode::Streaming);
}

#[tokio::test]
async fn test_run_periodic_rejected_for_historical() {
    let (fake, _) = FakeUpstream::search_only(Vec::new());
    let mut read = historical(ReaderConfig::default(), fake);

    let err = read.run_periodic(|_| Ok(true)).await.unwrap_err();
    assert!(matches!(err, Error::WrongMode { .. }));
}
