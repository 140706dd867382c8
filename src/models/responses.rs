//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheValue, StatsSnapshot};
use crate::cipher::Record;
use crate::snapshot::Snapshot;

/// Response body for `GET /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct ValueResponse {
    /// The requested key
    pub key: String,
    /// The stored value; bytes are base64-encoded
    pub value: Value,
    /// One of `text`, `json` or `base64`
    pub encoding: &'static str,
}

impl ValueResponse {
    pub fn new(key: impl Into<String>, value: CacheValue) -> Self {
        let (value, encoding) = match value {
            CacheValue::Text(text) => (Value::String(text), "text"),
            CacheValue::Json(json) => (json, "json"),
            CacheValue::Bytes(bytes) => (Value::String(STANDARD.encode(bytes)), "base64"),
        };
        Self {
            key: key.into(),
            value,
            encoding,
        }
    }
}

/// Response body for `PUT /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for `DELETE /cache/:key` and `DELETE /backups/:filename`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key or file that was deleted
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("'{}' deleted successfully", key),
            key,
        }
    }
}

/// Prefetch queue gauges
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PrefetchStatus {
    /// Tasks waiting in the queue
    pub pending: usize,
    /// Whether a drain cycle is running
    pub processing: bool,
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Cache counters and gauges
    pub cache: StatsSnapshot,
    /// Prefetch queue state
    pub prefetch: PrefetchStatus,
    /// Whether the auto-backup schedule is running
    pub auto_backup: bool,
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for `GET /backups`
#[derive(Debug, Clone, Serialize)]
pub struct BackupListResponse {
    /// Number of snapshots
    pub count: usize,
    /// Snapshots, newest first
    pub backups: Vec<Snapshot>,
}

impl BackupListResponse {
    pub fn new(backups: Vec<Snapshot>) -> Self {
        Self {
            count: backups.len(),
            backups,
        }
    }
}

/// Response body for `POST /backups/clean`
#[derive(Debug, Clone, Serialize)]
pub struct CleanBackupsResponse {
    /// Snapshots deleted
    pub removed: usize,
    /// Retention that was applied
    pub retained: usize,
}

/// Response body for `POST /fields/rotate`
#[derive(Debug, Clone, Serialize)]
pub struct RotateResponse {
    /// Version used for new encryptions
    pub active_version: u32,
    /// All versions that still decrypt
    pub known_versions: Vec<u32>,
}

/// Response body for the field endpoints
#[derive(Debug, Clone, Serialize)]
pub struct FieldsResponse {
    /// Transformed record
    pub record: Record,
    /// Fields re-encrypted, reported by `/fields/migrate` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrated: Option<usize>,
}

impl FieldsResponse {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            migrated: None,
        }
    }
}
