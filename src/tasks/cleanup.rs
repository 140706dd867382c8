//! Cache Sweep Task
//!
//! Background task that periodically removes expired cache entries, covering
//! entries that are never read again after expiring.

use std::time::Duration;

use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::tasks::ScheduledTask;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The sweep takes the cache write lock for the duration of one scan. It only
/// deletes entries that are already expired, so it never races a valid read.
///
/// # Arguments
/// * `cache` - shared handle to the cache
/// * `interval` - time between sweeps, usually `CacheConfig::cleanup_interval`
///
/// # Returns
/// A `ScheduledTask` owned by the composing application; dropping or stopping
/// it ends the sweep.
///
/// # Example
/// ```ignore
/// let cache = SharedCache::with_config(config.cache());
/// let sweep = spawn_cleanup_task(cache.clone(), config.cache().cleanup_interval);
/// // Later, during shutdown:
/// sweep.shutdown().await;
/// ```
pub fn spawn_cleanup_task(cache: SharedCache, interval: Duration) -> ScheduledTask {
    info!(
        "Starting cache sweep with interval of {} ms",
        interval.as_millis()
    );

    ScheduledTask::spawn("cache-sweep", interval, move || {
        let cache = cache.clone();
        async move {
            let removed = cache.cleanup_expired().await;

            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}
