//! Background Tasks Module
//!
//! Periodic jobs with explicit stop handles owned by the composing application.
//!
//! # Tasks
//! - Cache sweep: removes expired cache entries at the configured interval
//! - Auto-backup: scheduled by `SnapshotManager::start_auto_backup`

mod cleanup;
mod scheduled;

pub use cleanup::spawn_cleanup_task;
pub use scheduled::ScheduledTask;
