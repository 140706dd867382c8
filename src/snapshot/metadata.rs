//! Snapshot Metadata
//!
//! Sidecar records and the on-disk naming scheme:
//! `<timestamp>[_pre_restore].snapshot` plus `<snapshot file>.meta` (JSON).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension of snapshot content files
pub const SNAPSHOT_EXTENSION: &str = ".snapshot";

/// Suffix appended to a snapshot filename to name its sidecar
pub const SIDECAR_SUFFIX: &str = ".meta";

/// Marker carried by safety snapshots taken before a restore
pub const PRE_RESTORE_MARKER: &str = "_pre_restore";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

// == Snapshot Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Regular backup cycle
    Regular,
    /// Safety copy of the destination taken before a restore
    PreRestore,
}

// == Sidecar ==
/// Contents of a snapshot's sidecar file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Lowercase hex SHA-256 of the source bytes
    pub hash: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Source size in bytes
    pub size: u64,
    /// Whether the snapshot file is sealed
    pub encrypted: bool,
}

impl SnapshotMetadata {
    /// True when `hash` looks like a SHA-256 hex digest.
    pub fn has_valid_hash(&self) -> bool {
        self.hash.len() == 64 && self.hash.chars().all(|c| c.is_ascii_hexdigit())
    }
}

// == Snapshot ==
/// A listed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Snapshot file name inside the backup directory
    pub filename: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Hash of the source bytes
    pub source_hash: String,
    /// Source size in bytes
    pub size_bytes: u64,
    /// Whether the content is sealed
    pub encrypted: bool,
}

impl Snapshot {
    pub fn from_metadata(filename: impl Into<String>, metadata: SnapshotMetadata) -> Self {
        Self {
            filename: filename.into(),
            created_at: metadata.timestamp,
            source_hash: metadata.hash,
            size_bytes: metadata.size,
            encrypted: metadata.encrypted,
        }
    }

    /// True for safety snapshots taken before a restore.
    pub fn is_pre_restore(&self) -> bool {
        self.filename.contains(PRE_RESTORE_MARKER)
    }
}

// == Naming ==
/// File name for a snapshot created at `timestamp`.
pub fn snapshot_filename(timestamp: DateTime<Utc>, kind: SnapshotKind) -> String {
    let marker = match kind {
        SnapshotKind::Regular => "",
        SnapshotKind::PreRestore => PRE_RESTORE_MARKER,
    };
    format!(
        "{}{}{}",
        timestamp.format(TIMESTAMP_FORMAT),
        marker,
        SNAPSHOT_EXTENSION
    )
}

/// File name of the sidecar belonging to `filename`.
pub fn sidecar_filename(filename: &str) -> String {
    format!("{filename}{SIDECAR_SUFFIX}")
}

/// True for plain snapshot file names (no path components).
pub fn is_snapshot_filename(name: &str) -> bool {
    name.ends_with(SNAPSHOT_EXTENSION)
        && name.len() > SNAPSHOT_EXTENSION.len()
        && !name.contains(['/', '\\'])
        && name != ".."
}
