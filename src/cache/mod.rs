//! Cache Module
//!
//! Provides a size- and age-bounded in-memory cache for API payloads with
//! oldest-first eviction, hit/miss statistics and a shared async handle.

mod age;
mod entry;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use age::AgeTracker;
pub use entry::{current_timestamp_ms, CacheEntry, CacheValue, Metadata};
pub use shared::{RetryPolicy, SharedCache};
pub use stats::{CacheStats, StatsSnapshot};
pub use store::BoundedCache;
