//! Snapshot Module
//!
//! Backup and restore of a file-based data store.

mod manager;
mod metadata;

pub use manager::{BackupReceipt, RestoreReport, SnapshotManager};
pub use metadata::{
    is_snapshot_filename, sidecar_filename, snapshot_filename, Snapshot, SnapshotKind,
    SnapshotMetadata, PRE_RESTORE_MARKER, SIDECAR_SUFFIX, SNAPSHOT_EXTENSION,
};
