//! Resource Kit - client-side resource management toolkit
//!
//! A size-bounded in-memory cache with age expiry and a priority prefetch
//! queue, encrypted snapshots of a file-based data store, and per-field
//! record encryption with key rotation. The `api` module exposes all of it
//! over an admin HTTP surface.

pub mod api;
pub mod cache;
pub mod cipher;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod prefetch;
pub mod snapshot;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{BoundedCache, CacheValue, RetryPolicy, SharedCache};
pub use cipher::FieldCipher;
pub use config::Config;
pub use error::{KitError, Result};
pub use prefetch::{PrefetchScheduler, Priority};
pub use snapshot::SnapshotManager;
pub use tasks::{spawn_cleanup_task, ScheduledTask};
