//! Bounded SCPI error queue.
//!
//! The queue holds at most `capacity` entries. Pushing into a full queue
//! keeps the oldest `capacity - 1` entries and makes the `-350 Queue
//! overflow` sentinel the newest one, so a consumer draining the queue
//! always learns that errors were lost. Popping an empty queue yields the
//! `0 No error` sentinel.

use std::collections::VecDeque;

use crate::ErrorEntry;

/// Fixed-capacity FIFO of [`ErrorEntry`] values.
#[derive(Debug, Clone)]
pub struct ErrorQueue {
    entries: VecDeque<ErrorEntry>,
    capacity: usize,
}

impl ErrorQueue {
    /// Create an empty queue holding at most `capacity` entries.
    ///
    /// Storage is allocated up front. Panics if `capacity` is zero; callers
    /// validate configuration before constructing the queue.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "error queue capacity must be at least 1");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, collapsing the tail into the overflow sentinel when
    /// the queue is already full.
    ///
    /// Returns `false` if the entry itself was not retained.
    pub fn push(&mut self, entry: ErrorEntry) -> bool {
        if self.entries.len() < self.capacity {
            self.entries.push_back(entry);
            return true;
        }
        self.entries.truncate(self.capacity - 1);
        self.entries.push_back(ErrorEntry::queue_overflow());
        false
    }

    /// Remove and return the oldest entry, or the "no error" sentinel.
    pub fn pop(&mut self) -> ErrorEntry {
        self.entries.pop_front().unwrap_or_else(ErrorEntry::no_error)
    }

    /// The oldest entry without removing it.
    pub fn peek(&self) -> Option<&ErrorEntry> {
        self.entries.front()
    }

    /// Number of pending entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all pending entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate pending entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter()
    }
}
