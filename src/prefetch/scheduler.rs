//! Prefetch Scheduler Module
//!
//! Priority queue that populates a `SharedCache` ahead of demand.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::cache::{CacheValue, SharedCache};
use crate::prefetch::{PrefetchTask, Priority};

// == Queue State ==
#[derive(Debug, Default)]
struct QueueState {
    /// Tasks not yet started
    tasks: Vec<PrefetchTask>,
    /// Key of the task currently executing
    in_flight: Option<String>,
    /// Set while a drain loop owns the queue; only flipped under this lock
    processing: bool,
    next_seq: u64,
}

struct Inner {
    cache: SharedCache,
    state: Mutex<QueueState>,
    idle: Notify,
}

// == Prefetch Scheduler ==
/// Serialized, priority-ordered prefetcher.
///
/// At most one drain loop runs at a time. Each cycle sorts the tasks queued at
/// its start by priority then enqueue order and runs their producers one by
/// one. Tasks enqueued during a cycle are picked up by the next cycle of the
/// same loop. Producers are never retried here.
#[derive(Clone)]
pub struct PrefetchScheduler {
    inner: Arc<Inner>,
}

impl PrefetchScheduler {
    /// Creates a scheduler that writes into `cache`.
    pub fn new(cache: SharedCache) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        }
    }

    /// The backing cache.
    pub fn cache(&self) -> &SharedCache {
        &self.inner.cache
    }

    // == Enqueue ==
    /// Queues `producer` to fill `key`, starting a drain loop if none runs.
    ///
    /// Returns `false` without queuing when the cache already holds a fresh
    /// value for `key`, or when a task for `key` is queued or in flight.
    /// Must be called from within a tokio runtime.
    pub async fn enqueue<F, Fut>(
        &self,
        key: impl Into<String>,
        producer: F,
        priority: Priority,
    ) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<CacheValue>> + Send + 'static,
    {
        let key = key.into();
        if self.inner.cache.contains_fresh(&key).await {
            debug!(key = %key, "Prefetch skipped, already cached");
            return false;
        }

        let start_drain = {
            let mut state = self.inner.state.lock().await;
            let duplicate = state.in_flight.as_deref() == Some(key.as_str())
                || state.tasks.iter().any(|task| task.key == key);
            if duplicate {
                return false;
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state
                .tasks
                .push(PrefetchTask::new(key, priority, seq, producer));

            !std::mem::replace(&mut state.processing, true)
        };

        if start_drain {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.drain().await });
        }
        true
    }

    // == Cancel ==
    /// Removes the queued task for `key`. In-flight work is not affected.
    pub async fn cancel(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.tasks.iter().position(|task| task.key == key) {
            Some(index) => {
                state.tasks.remove(index);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Drops every queued task; returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let dropped = state.tasks.len();
        state.tasks.clear();
        dropped
    }

    /// Number of queued (not yet started) tasks.
    pub async fn pending(&self) -> usize {
        self.inner.state.lock().await.tasks.len()
    }

    /// True while a drain loop is running.
    pub async fn is_processing(&self) -> bool {
        self.inner.state.lock().await.processing
    }

    // == Wait Idle ==
    /// Resolves once the queue is drained and no loop is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.inner.state.lock().await.processing {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    async fn drain(&self) {
        loop {
            let cycle: Vec<u64> = {
                let mut state = self.state.lock().await;
                if state.tasks.is_empty() {
                    state.processing = false;
                    drop(state);
                    self.idle.notify_waiters();
                    return;
                }
                state.tasks.sort_by_key(|task| task.order_key());
                state.tasks.iter().map(|task| task.seq).collect()
            };

            debug!(tasks = cycle.len(), "Prefetch cycle started");

            for seq in cycle {
                let task = {
                    let mut state = self.state.lock().await;
                    // Gone if cancelled or cleared since the cycle started
                    let Some(index) = state.tasks.iter().position(|task| task.seq == seq) else {
                        continue;
                    };
                    let task = state.tasks.remove(index);
                    state.in_flight = Some(task.key.clone());
                    task
                };

                self.execute(task).await;
                self.state.lock().await.in_flight = None;
            }
        }
    }

    async fn execute(&self, task: PrefetchTask) {
        let key = task.key.clone();

        // Spawned so a panicking producer cannot take the drain loop down
        match tokio::spawn(task.run()).await {
            Ok(Ok(value)) => {
                if self.cache.set(key.clone(), value, None).await {
                    debug!(key = %key, "Prefetched");
                } else {
                    warn!(key = %key, "Prefetched value too large for cache");
                }
            }
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "Prefetch producer failed");
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Prefetch producer panicked");
            }
        }
    }
}
