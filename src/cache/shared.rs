//! Shared Cache Handle
//!
//! Async, cloneable handle over a `BoundedCache` plus the read-through
//! `get_or_fetch` helper used by API consumers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{BoundedCache, CacheValue, Metadata, StatsSnapshot};
use crate::config::CacheConfig;

// == Retry Policy ==
/// Backoff settings for `get_or_fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub retry_count: u32,
    /// Delay before the first retry; doubles on each further retry
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            retry_count: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

// == Shared Cache ==
/// Thread-safe handle to a `BoundedCache`.
///
/// Cloning is cheap; every clone refers to the same store.
#[derive(Debug, Clone)]
pub struct SharedCache {
    inner: Arc<RwLock<BoundedCache>>,
}

impl SharedCache {
    /// Wraps an existing cache.
    pub fn new(cache: BoundedCache) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cache)),
        }
    }

    /// Creates a handle over an empty cache with the given limits.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::new(BoundedCache::new(config))
    }

    /// See [`BoundedCache::set`].
    pub async fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<CacheValue>,
        metadata: Option<Metadata>,
    ) -> bool {
        self.inner.write().await.set(key, value, metadata)
    }

    /// See [`BoundedCache::get`]. Takes the write lock for lazy expiry and stats.
    pub async fn get(&self, key: &str) -> Option<CacheValue> {
        self.inner.write().await.get(key)
    }

    /// See [`BoundedCache::delete`].
    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.delete(key)
    }

    /// See [`BoundedCache::contains_fresh`].
    pub async fn contains_fresh(&self, key: &str) -> bool {
        self.inner.read().await.contains_fresh(key)
    }

    /// See [`BoundedCache::cleanup_expired`].
    pub async fn cleanup_expired(&self) -> usize {
        self.inner.write().await.cleanup_expired()
    }

    /// See [`BoundedCache::stats`].
    pub async fn stats(&self) -> StatsSnapshot {
        self.inner.read().await.stats()
    }

    /// See [`BoundedCache::clear`].
    pub async fn clear(&self) {
        self.inner.write().await.clear()
    }

    /// Configured limits.
    pub async fn config(&self) -> CacheConfig {
        *self.inner.read().await.config()
    }

    // == Get Or Fetch ==
    /// Returns the cached value for `key`, or fetches, stores and returns it.
    ///
    /// The producer is retried per `policy` with exponential backoff. The
    /// lock is never held while the producer runs.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        mut producer: F,
        policy: RetryPolicy,
    ) -> anyhow::Result<CacheValue>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<CacheValue>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let mut attempt = 0;
        loop {
            match producer().await {
                Ok(value) => {
                    if !self.set(key, value.clone(), None).await {
                        debug!(key = %key, "Fetched value not cached");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < policy.retry_count => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        key = %key,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
