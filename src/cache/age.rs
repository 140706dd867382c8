//! Age Tracker Module
//!
//! Tracks insertion order for age-based (FIFO) cache eviction.

use std::collections::VecDeque;

// == Age Tracker ==
/// Tracks creation order for oldest-first eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Oldest entry
/// - Back = Newest entry
///
/// Reads never reorder keys; only re-inserting a key moves it to the back.
#[derive(Debug, Default)]
pub struct AgeTracker {
    /// Keys ordered by creation time
    order: VecDeque<String>,
}

impl AgeTracker {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Push ==
    /// Records `key` as the newest entry.
    ///
    /// A key that is already tracked is moved to the back.
    pub fn push(&mut self, key: &str) {
        self.remove(key);
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest key.
    ///
    /// Returns None if tracker is empty.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    // == Peek Oldest ==
    /// Returns the oldest key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.front()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
