//! Configuration Module
//!
//! Handles loading and managing toolkit configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default passphrase used when `ENCRYPTION_KEY` is not set.
pub const DEFAULT_ENCRYPTION_KEY: &str = "change-me";

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum total cache size in bytes
    pub cache_max_size: u64,
    /// Maximum entry age in milliseconds
    pub cache_max_age_ms: u64,
    /// Cache sweep interval in milliseconds
    pub cache_cleanup_interval_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Directory holding snapshot files and their sidecars
    pub backup_dir: PathBuf,
    /// Data store file to back up automatically, if any
    pub backup_source: Option<PathBuf>,
    /// Auto-backup interval in milliseconds
    pub backup_interval_ms: u64,
    /// Number of snapshots retained after each backup cycle
    pub max_backups: usize,
    /// Passphrase the snapshot and field keys are derived from
    pub encryption_key: String,
    /// Active field key version; versions 1 through this one are derived
    pub field_key_version: u32,
}

/// Parameters for a `BoundedCache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum total tracked size in bytes
    pub max_size: u64,
    /// Entries older than this are expired
    pub max_age: Duration,
    /// Period of the background sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 50 * 1024 * 1024,
            max_age: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Parameters for a `SnapshotManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Directory holding snapshot files and their sidecars
    pub backup_dir: PathBuf,
    /// Retention applied after each regular backup; `None` disables it
    pub max_backups: Option<usize>,
    /// Whether snapshot content is encrypted at rest
    pub encrypt: bool,
}

impl SnapshotConfig {
    /// Creates an encrypting config with the default retention of 10.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_backups: Some(10),
            encrypt: true,
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Cache budget in bytes (default: 50 MiB)
    /// - `CACHE_MAX_AGE_MS` - Entry lifetime (default: 30 minutes)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep period (default: 5 minutes)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `BACKUP_DIR` - Snapshot directory (default: ./backups)
    /// - `BACKUP_SOURCE` - File to back up automatically (default: unset)
    /// - `BACKUP_INTERVAL_MS` - Auto-backup period (default: 24 hours)
    /// - `MAX_BACKUPS` - Snapshots retained (default: 10)
    /// - `ENCRYPTION_KEY` - Key passphrase (default: insecure placeholder)
    /// - `FIELD_KEY_VERSION` - Active field key version (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_max_size: parse_var("CACHE_MAX_SIZE").unwrap_or(defaults.cache_max_size),
            cache_max_age_ms: parse_var("CACHE_MAX_AGE_MS").unwrap_or(defaults.cache_max_age_ms),
            cache_cleanup_interval_ms: parse_var("CACHE_CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cache_cleanup_interval_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            backup_dir: env::var("BACKUP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.backup_dir),
            backup_source: env::var("BACKUP_SOURCE").ok().map(PathBuf::from),
            backup_interval_ms: parse_var("BACKUP_INTERVAL_MS")
                .unwrap_or(defaults.backup_interval_ms),
            max_backups: parse_var("MAX_BACKUPS").unwrap_or(defaults.max_backups),
            encryption_key: env::var("ENCRYPTION_KEY").unwrap_or(defaults.encryption_key),
            field_key_version: parse_var("FIELD_KEY_VERSION")
                .unwrap_or(defaults.field_key_version),
        }
    }

    /// Cache parameters derived from this config.
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.cache_max_size,
            max_age: Duration::from_millis(self.cache_max_age_ms),
            cleanup_interval: Duration::from_millis(self.cache_cleanup_interval_ms),
        }
    }

    /// Snapshot parameters derived from this config.
    pub fn snapshot(&self) -> SnapshotConfig {
        SnapshotConfig {
            backup_dir: self.backup_dir.clone(),
            max_backups: Some(self.max_backups),
            encrypt: true,
        }
    }

    /// Auto-backup period.
    pub fn backup_interval(&self) -> Duration {
        Duration::from_millis(self.backup_interval_ms)
    }

    /// True when the passphrase is still the built-in placeholder.
    pub fn uses_default_key(&self) -> bool {
        self.encryption_key == DEFAULT_ENCRYPTION_KEY
    }
}

impl Default for Config {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            cache_max_size: cache.max_size,
            cache_max_age_ms: cache.max_age.as_millis() as u64,
            cache_cleanup_interval_ms: cache.cleanup_interval.as_millis() as u64,
            server_port: 3000,
            backup_dir: PathBuf::from("./backups"),
            backup_source: None,
            backup_interval_ms: 24 * 60 * 60 * 1000,
            max_backups: 10,
            encryption_key: DEFAULT_ENCRYPTION_KEY.to_string(),
            field_key_version: 1,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
