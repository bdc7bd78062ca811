//! The upstream API seam.
//!
//! The connector talks to two upstream endpoints:
//!
//! - a pull-based search call, one round trip per page, paged newest-first
//!   with an inclusive `max_id` cursor
//! - a push-based live subscription that emits items (and transport errors)
//!   until it is destroyed
//!
//! Authentication and transport are the implementor's concern. A client is
//! owned by exactly one [`SearchRead`](crate::SearchRead) for its lifetime.

use crate::normalize::RawItem;
use crate::query::Query;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

/// Opaque upstream pagination id.
///
/// Upstream ids are 64-bit and may exceed what some clients can represent
/// exactly, so they are carried as strings and never manipulated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaxId(String);

impl MaxId {
    /// Wrap an upstream id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as transmitted upstream.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One search page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Compiled query string.
    pub query: String,
    /// Number of items requested.
    pub count: usize,
    /// Inclusive upper bound on item ids, if continuing from a previous page.
    pub max_id: Option<MaxId>,
}

/// An event delivered by a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A pushed item.
    Data(RawItem),
    /// A transport-level error. The subscription may keep delivering data.
    Error(String),
}

/// Result of polling a subscription without waiting.
#[derive(Debug)]
pub(crate) enum Poll {
    Event(StreamEvent),
    Empty,
    Closed,
}

/// A cancellable handle on a live subscription.
///
/// Dropping the handle (or calling [`close`](Self::close)) stops the stream:
/// the channel is closed and the producer task, if any, is aborted.
pub struct Subscription {
    events: mpsc::Receiver<StreamEvent>,
    producer: Option<JoinHandle<()>>,
    closed: bool,
}

impl Subscription {
    /// Wrap a receiver fed by a producer the caller manages.
    pub fn new(events: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            events,
            producer: None,
            closed: false,
        }
    }

    /// Wrap a receiver fed by `producer`, which is aborted on close.
    pub fn with_producer(events: mpsc::Receiver<StreamEvent>, producer: JoinHandle<()>) -> Self {
        Self {
            events,
            producer: Some(producer),
            closed: false,
        }
    }

    /// Create a bounded subscription channel.
    pub fn channel(capacity: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Whether the subscription has been closed or its producer has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the stream. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }

    pub(crate) fn poll(&mut self) -> Poll {
        if self.closed {
            return Poll::Closed;
        }
        match self.events.try_recv() {
            Ok(event) => Poll::Event(event),
            Err(TryRecvError::Empty) => Poll::Empty,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                Poll::Closed
            }
        }
    }

    /// Wait for the next event; `None` once the stream has ended.
    pub(crate) async fn recv(&mut self) -> Option<StreamEvent> {
        if self.closed {
            return None;
        }
        let event = self.events.recv().await;
        if event.is_none() {
            self.closed = true;
        }
        event
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.closed)
            .field("has_producer", &self.producer.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Client for the upstream search and streaming API.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Human-readable name for this client (used in logs).
    fn name(&self) -> &'static str {
        "upstream"
    }

    /// Fetch one page of search results, newest first.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawItem>>;

    /// Open a live subscription tracking `query`.
    async fn subscribe(&self, query: &Query) -> Result<Subscription>;
}
