//! Prefetch Module
//!
//! Speculatively populates the shared cache ahead of consumer demand.

mod scheduler;
mod task;

pub use scheduler::PrefetchScheduler;
pub use task::{PrefetchTask, Priority, Producer, ProducerFuture};
