//! Bounded Cache Module
//!
//! Main cache engine combining HashMap storage with age-ordered eviction,
//! a total size budget and max-age expiry.

use std::collections::HashMap;

use tracing::warn;

use crate::cache::{AgeTracker, CacheEntry, CacheStats, CacheValue, Metadata, StatsSnapshot};
use crate::config::CacheConfig;

// == Bounded Cache ==
/// Size- and age-bounded key/value store.
///
/// Eviction always removes the globally oldest entry by creation order, so
/// this is a FIFO policy: reads do not refresh an entry's position.
#[derive(Debug)]
pub struct BoundedCache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Creation order tracker
    ages: AgeTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Sum of `size_bytes` over all live entries
    total_size: u64,
    /// Size and age limits
    config: CacheConfig,
}

impl BoundedCache {
    // == Constructor ==
    /// Creates an empty cache with the given limits.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            ages: AgeTracker::new(),
            stats: CacheStats::new(),
            total_size: 0,
            config,
        }
    }

    // == Set ==
    /// Stores a value, evicting the oldest entries until it fits.
    ///
    /// Returns `false` without touching the cache when the value alone is
    /// larger than the configured maximum size. Storing an existing key
    /// replaces it and gives it a fresh creation time.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<CacheValue>,
        metadata: Option<Metadata>,
    ) -> bool {
        let entry = CacheEntry::new(key.into(), value.into(), metadata.unwrap_or_default());

        if entry.size_bytes > self.config.max_size {
            warn!(
                key = %entry.key,
                size = entry.size_bytes,
                max_size = self.config.max_size,
                "Value too large for cache"
            );
            return false;
        }

        // Replacement releases the old value's budget without counting an eviction
        if let Some(previous) = self.entries.remove(&entry.key) {
            self.total_size -= previous.size_bytes;
            self.ages.remove(&entry.key);
        }

        while self.total_size + entry.size_bytes > self.config.max_size {
            if !self.evict_oldest() {
                break;
            }
        }

        self.ages.push(&entry.key);
        self.total_size += entry.size_bytes;
        self.entries.insert(entry.key.clone(), entry);

        true
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed as a side effect and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<CacheValue> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(self.config.max_age),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.delete(key);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Peek ==
    /// Returns the entry if present and fresh, without touching statistics.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(self.config.max_age))
    }

    // == Contains Fresh ==
    /// True when `key` holds a non-expired value.
    pub fn contains_fresh(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Every removal counts as an eviction, whether explicit, by expiry or
    /// to make room. Returns `false` if the key was absent.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key);
        if removed {
            self.ages.remove(key);
        }
        removed
    }

    /// Drops the entry and counts an eviction. The age queue is left alone.
    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.total_size -= entry.size_bytes;
                self.stats.record_eviction();
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    fn evict_oldest(&mut self) -> bool {
        match self.ages.pop_oldest() {
            // Already popped from the age queue
            Some(key) => self.remove_entry(&key),
            None => false,
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let max_age = self.config.max_age;
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(max_age))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in expired_keys {
            if self.delete(&key) {
                removed += 1;
            }
        }
        removed
    }

    // == Stats ==
    /// Returns counters plus the current size and item count.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::new(self.stats, self.total_size, self.entries.len())
    }

    // == Clear ==
    /// Empties the store and resets every counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ages.clear();
        self.stats = CacheStats::new();
        self.total_size = 0;
    }

    // == Total Size ==
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    // == Config ==
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BoundedCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    fn cache_with(max_size: u64, max_age_ms: u64) -> BoundedCache {
        BoundedCache::new(CacheConfig {
            max_size,
            max_age: Duration::from_millis(max_age_ms),
            cleanup_interval: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_cache_new() {
        let cache = cache_with(100, 1000);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.total_size(), 0);
    }

    #[test]
    fn test_cache_set_and_get() {
        let mut cache = cache_with(1024, 60_000);

        assert!(cache.set("key1", "value1", None));
        let value = cache.get("key1");

        assert_eq!(value, Some(CacheValue::Text("value1".to_string())));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_size(), 12);
    }

    #[test]
    fn test_cache_get_nonexistent() {
        let mut cache = cache_with(1024, 60_000);

        assert_eq!(cache.get("nonexistent"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_stores_metadata() {
        let mut cache = cache_with(1024, 60_000);
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("/api/forms"));

        cache.set("forms", json!([1, 2, 3]), Some(metadata));

        let entry = cache.peek("forms").unwrap();
        assert_eq!(entry.metadata["source"], "/api/forms");
    }

    #[test]
    fn test_cache_rejects_oversized_value() {
        let mut cache = cache_with(100, 60_000);
        cache.set("small", vec![0u8; 10], None);

        assert!(!cache.set("huge", vec![0u8; 101], None));

        // Rejection leaves existing entries alone
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_cache_value_of_exact_max_size_fits() {
        let mut cache = cache_with(100, 60_000);
        assert!(cache.set("exact", vec![0u8; 100], None));
        assert_eq!(cache.total_size(), 100);
    }

    #[test]
    fn test_cache_evicts_oldest_to_make_room() {
        let mut cache = cache_with(100, 60_000);

        cache.set("first", vec![1u8; 40], None);
        cache.set("second", vec![2u8; 40], None);
        cache.set("third", vec![3u8; 40], None);

        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
        assert_eq!(cache.total_size(), 80);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_eviction_ignores_reads() {
        let mut cache = cache_with(100, 60_000);

        cache.set("first", vec![1u8; 40], None);
        cache.set("second", vec![2u8; 40], None);

        // Reading does not protect an entry from age-based eviction
        cache.get("first");
        cache.set("third", vec![3u8; 40], None);

        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
    }

    #[test]
    fn test_cache_evicts_several_for_large_value() {
        let mut cache = cache_with(100, 60_000);

        cache.set("a", vec![0u8; 30], None);
        cache.set("b", vec![0u8; 30], None);
        cache.set("c", vec![0u8; 30], None);
        cache.set("big", vec![0u8; 90], None);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_size(), 90);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_cache_age_queue_tracks_entries_through_eviction() {
        let mut cache = cache_with(100, 60_000);

        for i in 0..10 {
            cache.set(format!("key{i}"), vec![0u8; 30], None);
            assert_eq!(cache.ages.len(), cache.entries.len());
        }

        // Oldest remaining entries are evicted in order
        assert_eq!(cache.ages.peek_oldest().map(String::as_str), Some("key7"));
        assert_eq!(cache.stats().evictions, 7);

        cache.delete("key8");
        assert_eq!(cache.ages.len(), 2);
        assert!(!cache.ages.contains("key8"));
    }

    #[test]
    fn test_cache_overwrite_replaces_size() {
        let mut cache = cache_with(100, 60_000);

        cache.set("key", vec![0u8; 60], None);
        cache.set("key", vec![0u8; 20], None);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_size(), 20);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_cache_overwrite_refreshes_age() {
        let mut cache = cache_with(100, 60_000);

        cache.set("a", vec![0u8; 40], None);
        cache.set("b", vec![0u8; 40], None);
        cache.set("a", vec![0u8; 40], None);
        cache.set("c", vec![0u8; 40], None);

        // "b" is now the oldest
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_delete() {
        let mut cache = cache_with(1024, 60_000);

        cache.set("key1", "value1", None);
        assert!(cache.delete("key1"));

        assert!(cache.is_empty());
        assert_eq!(cache.total_size(), 0);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("key1").is_none());
    }

    #[test]
    fn test_cache_delete_nonexistent() {
        let mut cache = cache_with(1024, 60_000);
        assert!(!cache.delete("nonexistent"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_cache_lazy_expiry() {
        let mut cache = cache_with(1024, 50);

        cache.set("key1", "value1", None);
        assert!(cache.get("key1").is_some());

        sleep(Duration::from_millis(120));

        assert!(cache.get("key1").is_none());
        // Expired entry was removed by the failed lookup
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.total_size(), 0);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cache_peek_skips_stats() {
        let mut cache = cache_with(1024, 60_000);
        cache.set("key1", "value1", None);

        assert!(cache.contains_fresh("key1"));
        assert!(!cache.contains_fresh("other"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_cleanup_expired() {
        let mut cache = cache_with(1024, 50);

        cache.set("key1", "value1", None);
        cache.set("key2", "value2", None);
        sleep(Duration::from_millis(120));
        cache.set("key3", "value3", None);

        let removed = cache.cleanup_expired();
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("key3").is_some());
    }

    #[test]
    fn test_cache_stats() {
        let mut cache = cache_with(1024, 60_000);

        cache.set("key1", "value1", None);
        cache.get("key1"); // hit
        cache.get("nonexistent"); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.size, 12);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_cache_clear_resets_counters() {
        let mut cache = cache_with(1024, 60_000);

        cache.set("key1", "value1", None);
        cache.get("key1");
        cache.get("missing");
        cache.delete("key1");
        cache.set("key2", "value2", None);

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.item_count, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }
}
