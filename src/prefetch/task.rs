//! Prefetch Task Module
//!
//! A queued request to populate one cache key.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::cache::{current_timestamp_ms, CacheValue};

/// Boxed future returned by a producer.
pub type ProducerFuture = Pin<Box<dyn Future<Output = anyhow::Result<CacheValue>> + Send>>;

/// One-shot value producer.
pub type Producer = Box<dyn FnOnce() -> ProducerFuture + Send>;

// == Priority ==
/// Drain order: `High` before `Normal` before `Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

// == Prefetch Task ==
/// A queued or in-flight prefetch.
pub struct PrefetchTask {
    /// Cache key the produced value is stored under
    pub key: String,
    /// Drain priority
    pub priority: Priority,
    /// Enqueue timestamp (Unix milliseconds)
    pub enqueued_at: u64,
    /// Enqueue order, breaks priority ties
    pub(crate) seq: u64,
    producer: Producer,
}

impl PrefetchTask {
    /// Creates a task stamped with the current time.
    pub fn new<F, Fut>(key: String, priority: Priority, seq: u64, producer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<CacheValue>> + Send + 'static,
    {
        Self {
            key,
            priority,
            enqueued_at: current_timestamp_ms(),
            seq,
            producer: Box::new(move || Box::pin(producer())),
        }
    }

    /// Sort key: priority first, then enqueue order.
    pub(crate) fn order_key(&self) -> (Priority, u64) {
        (self.priority, self.seq)
    }

    /// Consumes the task, starting its producer.
    pub(crate) fn run(self) -> ProducerFuture {
        (self.producer)()
    }
}

impl fmt::Debug for PrefetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchTask")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("enqueued_at", &self.enqueued_at)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
