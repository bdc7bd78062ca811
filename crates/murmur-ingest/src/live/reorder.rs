//! Bounded time-ordered buffer for live records.

use chrono::{DateTime, Utc};
use murmur_core::Record;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry keyed by record time.
///
/// Ties are broken by insertion sequence so equal-time records come out in
/// the order they were pushed.
#[derive(Debug)]
struct ReorderEntry {
    record: Record,
    seq: u64,
}

impl ReorderEntry {
    fn key(&self) -> (DateTime<Utc>, u64) {
        (self.record.time(), self.seq)
    }
}

impl PartialEq for ReorderEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ReorderEntry {}

impl PartialOrd for ReorderEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReorderEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other.key().cmp(&self.key())
    }
}

/// A min-heap of records by time with a hard size cap.
///
/// When full, new records are refused; buffered records are never evicted.
#[derive(Debug)]
pub struct ReorderBuffer {
    heap: BinaryHeap<ReorderEntry>,
    limit: usize,
    next_seq: u64,
}

impl ReorderBuffer {
    /// Create an empty buffer holding at most `limit` records.
    pub fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            limit,
            next_seq: 0,
        }
    }

    /// Insert a record, or hand it back if the buffer is full.
    pub fn push(&mut self, record: Record) -> Result<(), Record> {
        if self.is_full() {
            return Err(record);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ReorderEntry { record, seq });
        Ok(())
    }

    /// Time of the earliest buffered record.
    pub fn peek_time(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|entry| entry.record.time())
    }

    /// Remove and return the earliest buffered record.
    pub fn pop(&mut self) -> Option<Record> {
        self.heap.pop().map(|entry| entry.record)
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the buffer holds no records.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether another push would be refused.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.limit
    }

    /// Configured capacity.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
