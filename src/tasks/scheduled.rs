//! Scheduled Task
//!
//! A periodic background job with an explicit stop handle.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a job that runs every `interval` until stopped.
///
/// Stopping prevents further ticks but never interrupts a tick that has
/// already started. Dropping the handle stops the job.
#[derive(Debug)]
pub struct ScheduledTask {
    name: String,
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawns `tick` on the tokio runtime, first running it one `interval`
    /// after the call.
    pub fn spawn<F, Fut>(name: impl Into<String>, interval: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start(name.into(), interval, tick, false)
    }

    /// Like [`spawn`](Self::spawn), but runs `tick` once right away before
    /// the first interval.
    pub fn spawn_immediate<F, Fut>(name: impl Into<String>, interval: Duration, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start(name.into(), interval, tick, true)
    }

    fn start<F, Fut>(name: String, interval: Duration, mut tick: F, immediate: bool) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stop_rx) = watch::channel(false);
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            debug!(task = %task_name, interval_ms = interval.as_millis() as u64, "Scheduled task started");

            if immediate && !*stop_rx.borrow() {
                tick().await;
            }

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    // Fires on stop and when the handle is dropped
                    _ = stop_rx.changed() => break,
                }

                tick().await;
            }

            debug!(task = %task_name, "Scheduled task stopped");
        });

        Self {
            name,
            stop,
            handle: Some(handle),
        }
    }

    /// Task name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests a stop. Idempotent.
    pub fn stop(&self) {
        // Err only means the loop has already exited
        let _ = self.stop.send(true);
    }

    /// True until the loop has exited.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stops the task and waits for any in-progress tick to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(interval: Duration) -> (ScheduledTask, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = ScheduledTask::spawn("counter", interval, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, ticks)
    }

    #[tokio::test]
    async fn test_task_ticks_periodically() {
        let (task, ticks) = counting_task(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(130)).await;

        assert!(ticks.load(Ordering::SeqCst) >= 3);
        assert!(task.is_running());
        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_spawn_immediate_ticks_before_first_interval() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = ScheduledTask::spawn_immediate("eager", Duration::from_secs(5), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_prevents_further_ticks() {
        let (task, ticks) = counting_task(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(70)).await;
        task.stop();
        task.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let after_stop = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn test_drop_stops_task() {
        let (task, ticks) = counting_task(Duration::from_millis(20));
        drop(task);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_tick() {
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&finished);
        let task = ScheduledTask::spawn("slow", Duration::from_millis(10), move || {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                flag.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Let the first tick start, then stop mid-tick
        tokio::time::sleep(Duration::from_millis(25)).await;
        task.shutdown().await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
