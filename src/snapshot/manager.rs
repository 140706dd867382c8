//! Snapshot Manager
//!
//! Encrypted, integrity-stamped point-in-time copies of a file-based data
//! store, with retention pruning, verified restore and scheduled backups.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::SnapshotConfig;
use crate::crypto::{self, SecretKey};
use crate::error::{KitError, Result};
use crate::snapshot::metadata::{
    is_snapshot_filename, sidecar_filename, snapshot_filename, Snapshot, SnapshotKind,
    SnapshotMetadata,
};
use crate::tasks::ScheduledTask;

const KEY_INFO: &str = "resource_kit/snapshot/v1";

// == Receipts ==
/// Result of a successful backup cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReceipt {
    /// Snapshot file name inside the backup directory
    pub filename: String,
    /// Full path of the snapshot file
    pub path: PathBuf,
    /// Hex SHA-256 of the source bytes
    pub hash: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Snapshot that was restored
    pub restored: Snapshot,
    /// Safety snapshot of the previous destination content, if it existed
    pub safety_snapshot: Option<String>,
}

// == Cycle State ==
/// Guarded by the cycle mutex so backup cycles never overlap.
#[derive(Debug, Default)]
struct CycleState {
    last_stamp: Option<DateTime<Utc>>,
}

impl CycleState {
    /// Strictly increasing microsecond timestamps, so names never collide.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

// == Snapshot Manager ==
pub struct SnapshotManager {
    config: SnapshotConfig,
    key: SecretKey,
    cycle: Mutex<CycleState>,
    auto_backup: Mutex<Option<ScheduledTask>>,
}

impl SnapshotManager {
    /// Creates a manager whose snapshot key is derived from `passphrase`.
    pub fn new(config: SnapshotConfig, passphrase: &str) -> Result<Self> {
        let key = crypto::derive_key(passphrase.as_bytes(), KEY_INFO)?;
        Ok(Self::with_key(config, key))
    }

    /// Creates a manager using `key` directly.
    pub fn with_key(config: SnapshotConfig, key: SecretKey) -> Self {
        Self {
            config,
            key,
            cycle: Mutex::new(CycleState::default()),
            auto_backup: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_dir
    }

    // == Create ==
    /// Snapshots `source`, then prunes to `max_backups` when configured.
    ///
    /// A failed prune is logged; the snapshot is on disk and the receipt is
    /// still returned.
    ///
    /// # Errors
    /// - `Io` if the source cannot be read or the snapshot cannot be written
    /// - `Encryption` if sealing fails
    pub async fn create_backup(&self, source: impl AsRef<Path>) -> Result<BackupReceipt> {
        let mut cycle = self.cycle.lock().await;
        let receipt = self
            .write_snapshot(&mut cycle, source.as_ref(), SnapshotKind::Regular)
            .await?;

        if let Some(max_backups) = self.config.max_backups {
            if let Err(err) = self.prune(max_backups).await {
                warn!(
                    snapshot = %receipt.filename,
                    error = %err,
                    "Retention prune failed after backup"
                );
            }
        }
        Ok(receipt)
    }

    async fn write_snapshot(
        &self,
        cycle: &mut CycleState,
        source: &Path,
        kind: SnapshotKind,
    ) -> Result<BackupReceipt> {
        let data = fs::read(source).await?;
        let hash = crypto::sha256_hex(&data);
        let payload = if self.config.encrypt {
            crypto::seal_blob(&self.key, &data)?
        } else {
            data.clone()
        };

        fs::create_dir_all(&self.config.backup_dir).await?;

        let timestamp = cycle.next_stamp();
        let filename = snapshot_filename(timestamp, kind);
        let metadata = SnapshotMetadata {
            hash: hash.clone(),
            timestamp,
            size: data.len() as u64,
            encrypted: self.config.encrypt,
        };
        let path = self.write_pair(&filename, &payload, &metadata).await?;

        info!(
            snapshot = %filename,
            source = %source.display(),
            size = data.len(),
            "Snapshot created"
        );

        Ok(BackupReceipt {
            filename,
            path,
            hash,
            timestamp,
        })
    }

    /// Writes a snapshot file and its sidecar. If the sidecar cannot be
    /// written the snapshot file is removed again, so no file is left
    /// without metadata.
    async fn write_pair(
        &self,
        filename: &str,
        payload: &[u8],
        metadata: &SnapshotMetadata,
    ) -> Result<PathBuf> {
        let sidecar = serde_json::to_vec_pretty(metadata)
            .map_err(|e| KitError::Internal(format!("failed to encode snapshot metadata: {e}")))?;

        let path = self.config.backup_dir.join(filename);
        write_atomic(&path, payload).await?;

        let sidecar_path = self.config.backup_dir.join(sidecar_filename(filename));
        if let Err(err) = write_atomic(&sidecar_path, &sidecar).await {
            if let Err(cleanup) = fs::remove_file(&path).await {
                error!(snapshot = %filename, error = %cleanup, "Failed to remove snapshot without metadata");
            }
            return Err(err);
        }
        Ok(path)
    }

    // == Restore ==
    /// Restores `filename` over `dest` after verifying it.
    ///
    /// Verification happens before anything is written. The current content
    /// of `dest`, if any, is first saved as a pre-restore snapshot, then
    /// `dest` is replaced atomically.
    ///
    /// # Errors
    /// - `InvalidBackup` if the sidecar is missing, the ciphertext does not
    ///   open, or the hash or size do not match; `dest` is left untouched
    /// - `Io` if the safety snapshot or the destination cannot be written
    pub async fn restore_from_backup(
        &self,
        filename: &str,
        dest: impl AsRef<Path>,
    ) -> Result<RestoreReport> {
        let dest = dest.as_ref();
        let mut cycle = self.cycle.lock().await;
        let (restored, plaintext) = self.load_verified(filename).await?;

        let safety_snapshot = if fs::try_exists(dest).await? {
            let receipt = self
                .write_snapshot(&mut cycle, dest, SnapshotKind::PreRestore)
                .await?;
            Some(receipt.filename)
        } else {
            None
        };

        write_atomic(dest, &plaintext).await?;

        info!(
            snapshot = %filename,
            dest = %dest.display(),
            safety_snapshot = ?safety_snapshot,
            "Snapshot restored"
        );

        Ok(RestoreReport {
            restored,
            safety_snapshot,
        })
    }

    // == Verify ==
    /// Runs the full restore-time integrity check without writing anything.
    pub async fn verify_backup(&self, filename: &str) -> Result<Snapshot> {
        self.load_verified(filename).await.map(|(snapshot, _)| snapshot)
    }

    async fn load_verified(&self, filename: &str) -> Result<(Snapshot, Vec<u8>)> {
        let invalid = |reason: String| KitError::InvalidBackup(format!("{filename}: {reason}"));

        if !is_snapshot_filename(filename) {
            return Err(invalid("not a snapshot file name".to_string()));
        }

        let metadata = self
            .read_metadata(filename)
            .await
            .map_err(|e| invalid(format!("metadata unavailable ({e})")))?;
        if !metadata.has_valid_hash() {
            return Err(invalid("metadata has no valid hash".to_string()));
        }

        let raw = fs::read(self.config.backup_dir.join(filename))
            .await
            .map_err(|e| invalid(format!("content unreadable ({e})")))?;

        let plaintext = if metadata.encrypted {
            crypto::open_blob(&self.key, &raw).map_err(|e| invalid(e.to_string()))?
        } else {
            raw
        };

        if plaintext.len() as u64 != metadata.size {
            return Err(invalid(format!(
                "size mismatch (expected {}, got {})",
                metadata.size,
                plaintext.len()
            )));
        }
        if crypto::sha256_hex(&plaintext) != metadata.hash {
            return Err(invalid("hash mismatch".to_string()));
        }

        Ok((Snapshot::from_metadata(filename, metadata), plaintext))
    }

    // == Metadata ==
    /// Reads the sidecar of `filename`.
    pub async fn get_backup_metadata(&self, filename: &str) -> Result<SnapshotMetadata> {
        self.read_metadata(filename).await
    }

    async fn read_metadata(&self, filename: &str) -> Result<SnapshotMetadata> {
        let path = self.config.backup_dir.join(sidecar_filename(filename));
        let bytes = fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => KitError::NotFound(format!("metadata for {filename}")),
            _ => KitError::Io(e),
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| KitError::InvalidBackup(format!("{filename}: malformed metadata ({e})")))
    }

    // == List ==
    /// All snapshots with readable sidecars, newest first.
    ///
    /// Snapshot files whose sidecar cannot be read are skipped with a warning.
    pub async fn list_backups(&self) -> Result<Vec<Snapshot>> {
        let (snapshots, unusable) = self.scan().await?;
        for name in &unusable {
            warn!(snapshot = %name, "Skipping snapshot without usable metadata");
        }
        Ok(snapshots)
    }

    /// Splits the backup directory into listed snapshots (newest first) and
    /// snapshot files whose sidecar is missing or unreadable.
    async fn scan(&self) -> Result<(Vec<Snapshot>, Vec<String>)> {
        let mut dir = match fs::read_dir(&self.config.backup_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        let mut unusable = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_snapshot_filename(&name) {
                continue;
            }
            match self.read_metadata(&name).await {
                Ok(metadata) => snapshots.push(Snapshot::from_metadata(name, metadata)),
                Err(_) => unusable.push(name),
            }
        }

        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok((snapshots, unusable))
    }

    // == Retention ==
    /// Keeps the newest `retain_count` snapshots and deletes the rest.
    ///
    /// Pre-restore safety snapshots count like any other. Snapshot files
    /// without usable metadata cannot be restored and are always deleted.
    /// Returns the number of snapshot files deleted.
    pub async fn clean_old_backups(&self, retain_count: usize) -> Result<usize> {
        let _cycle = self.cycle.lock().await;
        self.prune(retain_count).await
    }

    async fn prune(&self, retain_count: usize) -> Result<usize> {
        let (snapshots, unusable) = self.scan().await?;
        let mut removed = 0;

        for name in &unusable {
            self.remove_files(name).await?;
            warn!(snapshot = %name, "Removed snapshot without usable metadata");
            removed += 1;
        }

        for snapshot in snapshots.iter().skip(retain_count) {
            self.remove_files(&snapshot.filename).await?;
            info!(snapshot = %snapshot.filename, "Old snapshot removed");
            removed += 1;
        }
        Ok(removed)
    }

    /// Deletes one snapshot and its sidecar.
    pub async fn delete_backup(&self, filename: &str) -> Result<()> {
        if !is_snapshot_filename(filename) {
            return Err(KitError::InvalidRequest(format!(
                "{filename} is not a snapshot file name"
            )));
        }
        let _cycle = self.cycle.lock().await;
        self.remove_files(filename).await
    }

    async fn remove_files(&self, filename: &str) -> Result<()> {
        let content = self.config.backup_dir.join(filename);
        match fs::remove_file(&content).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KitError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(self.config.backup_dir.join(sidecar_filename(filename))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // == Auto Backup ==
    /// Runs `create_backup(source)` right away and then every `interval`,
    /// replacing any schedule already running.
    ///
    /// A failed cycle is logged and the schedule continues. The schedule
    /// keeps the manager alive until `stop_auto_backup` is called.
    pub async fn start_auto_backup(self: &Arc<Self>, source: impl Into<PathBuf>, interval: Duration) {
        let source = source.into();
        info!(
            source = %source.display(),
            interval_ms = interval.as_millis() as u64,
            "Auto-backup enabled"
        );

        let manager = Arc::clone(self);
        let task = ScheduledTask::spawn_immediate("auto-backup", interval, move || {
            let manager = Arc::clone(&manager);
            let source = source.clone();
            async move {
                if let Err(err) = manager.create_backup(&source).await {
                    error!(source = %source.display(), error = %err, "Auto-backup cycle failed");
                }
            }
        });

        if let Some(previous) = self.auto_backup.lock().await.replace(task) {
            previous.stop();
        }
    }

    /// Stops the schedule. A cycle already running completes. Idempotent;
    /// returns whether a schedule was running.
    pub async fn stop_auto_backup(&self) -> bool {
        match self.auto_backup.lock().await.take() {
            Some(task) => {
                task.stop();
                info!("Auto-backup stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_auto_backup_running(&self) -> bool {
        self.auto_backup
            .lock()
            .await
            .as_ref()
            .map(ScheduledTask::is_running)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// == Atomic Write ==
/// Writes `bytes` to a sibling temp file, syncs it, then renames over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        manager: Arc<SnapshotManager>,
    }

    async fn fixture() -> Fixture {
        fixture_with(SnapshotConfig {
            max_backups: None,
            ..SnapshotConfig::new("unused")
        })
        .await
    }

    async fn fixture_with(config: SnapshotConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("inspection.db");
        fs::write(&source, b"test data").await.unwrap();

        let config = SnapshotConfig {
            backup_dir: dir.path().join("backups"),
            ..config
        };
        let manager = Arc::new(SnapshotManager::new(config, "test-passphrase").unwrap());
        Fixture {
            _dir: dir,
            source,
            manager,
        }
    }

    #[tokio::test]
    async fn test_create_backup_writes_snapshot_and_sidecar() {
        let fx = fixture().await;

        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        assert!(receipt.filename.ends_with(".snapshot"));
        assert!(fs::try_exists(&receipt.path).await.unwrap());
        assert_eq!(receipt.hash, crypto::sha256_hex(b"test data"));

        let metadata = fx.manager.get_backup_metadata(&receipt.filename).await.unwrap();
        assert_eq!(metadata.hash, receipt.hash);
        assert_eq!(metadata.timestamp, receipt.timestamp);
        assert_eq!(metadata.size, 9);
        assert!(metadata.encrypted);
    }

    #[tokio::test]
    async fn test_backup_does_not_contain_plaintext() {
        let fx = fixture().await;

        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();
        let stored = fs::read(&receipt.path).await.unwrap();

        assert!(!stored.windows(9).any(|window| window == b"test data"));
    }

    #[tokio::test]
    async fn test_create_backup_missing_source() {
        let fx = fixture().await;

        let result = fx.manager.create_backup(fx.source.with_file_name("gone.db")).await;

        assert!(matches!(result, Err(KitError::Io(_))));
        assert!(fx.manager.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_roundtrip_with_safety_snapshot() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        fs::write(&fx.source, b"modified data").await.unwrap();
        let report = fx
            .manager
            .restore_from_backup(&receipt.filename, &fx.source)
            .await
            .unwrap();

        assert_eq!(fs::read(&fx.source).await.unwrap(), b"test data");
        assert_eq!(report.restored.filename, receipt.filename);

        let safety = report.safety_snapshot.unwrap();
        assert!(safety.contains("pre_restore"));

        // The safety snapshot holds the content that was overwritten
        let scratch = fx.source.with_file_name("scratch.db");
        fx.manager.restore_from_backup(&safety, &scratch).await.unwrap();
        assert_eq!(fs::read(&scratch).await.unwrap(), b"modified data");
    }

    #[tokio::test]
    async fn test_restore_to_missing_destination_skips_safety_snapshot() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();
        let dest = fx.source.with_file_name("fresh.db");

        let report = fx.manager.restore_from_backup(&receipt.filename, &dest).await.unwrap();

        assert!(report.safety_snapshot.is_none());
        assert_eq!(fs::read(&dest).await.unwrap(), b"test data");
        assert_eq!(fx.manager.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_rejects_tampered_hash() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        let sidecar = fx.manager.backup_dir().join(sidecar_filename(&receipt.filename));
        let mut metadata = fx.manager.get_backup_metadata(&receipt.filename).await.unwrap();
        metadata.hash = crypto::sha256_hex(b"something else");
        fs::write(&sidecar, serde_json::to_vec(&metadata).unwrap()).await.unwrap();

        fs::write(&fx.source, b"current data").await.unwrap();
        let result = fx.manager.restore_from_backup(&receipt.filename, &fx.source).await;

        assert!(matches!(result, Err(KitError::InvalidBackup(_))));
        assert_eq!(fs::read(&fx.source).await.unwrap(), b"current data");
        // No safety snapshot is taken for a rejected restore
        assert_eq!(fx.manager.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_rejects_corrupt_ciphertext() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        let mut stored = fs::read(&receipt.path).await.unwrap();
        let last = stored.len() - 1;
        stored[last] ^= 0xff;
        fs::write(&receipt.path, stored).await.unwrap();

        let result = fx.manager.restore_from_backup(&receipt.filename, &fx.source).await;
        assert!(matches!(result, Err(KitError::InvalidBackup(_))));
        assert_eq!(fs::read(&fx.source).await.unwrap(), b"test data");
    }

    #[tokio::test]
    async fn test_restore_rejects_missing_sidecar() {
        let fx = fixture().await;
        fs::create_dir_all(fx.manager.backup_dir()).await.unwrap();
        let orphan = "20240101T000000.000000Z.snapshot";
        fs::write(fx.manager.backup_dir().join(orphan), b"invalid data")
            .await
            .unwrap();

        let result = fx.manager.restore_from_backup(orphan, &fx.source).await;
        let err = result.unwrap_err();
        assert!(matches!(err, KitError::InvalidBackup(_)));
        assert!(err.to_string().starts_with("snapshot invalid"));
    }

    #[tokio::test]
    async fn test_restore_rejects_foreign_name() {
        let fx = fixture().await;
        let result = fx.manager.restore_from_backup("../inspection.db", &fx.source).await;
        assert!(matches!(result, Err(KitError::InvalidBackup(_))));
    }

    #[tokio::test]
    async fn test_restore_with_wrong_key_is_invalid() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        let other = SnapshotManager::new(fx.manager.config().clone(), "other-passphrase").unwrap();
        let result = other.verify_backup(&receipt.filename).await;
        assert!(matches!(result, Err(KitError::InvalidBackup(_))));
    }

    #[tokio::test]
    async fn test_unencrypted_snapshots_roundtrip() {
        let fx = fixture_with(SnapshotConfig {
            encrypt: false,
            max_backups: None,
            ..SnapshotConfig::new("unused")
        })
        .await;

        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();
        assert_eq!(fs::read(&receipt.path).await.unwrap(), b"test data");
        assert!(!fx.manager.get_backup_metadata(&receipt.filename).await.unwrap().encrypted);

        fs::write(&fx.source, b"changed").await.unwrap();
        fx.manager.restore_from_backup(&receipt.filename, &fx.source).await.unwrap();
        assert_eq!(fs::read(&fx.source).await.unwrap(), b"test data");
    }

    #[tokio::test]
    async fn test_list_backups_newest_first() {
        let fx = fixture().await;

        let mut created = Vec::new();
        for _ in 0..3 {
            created.push(fx.manager.create_backup(&fx.source).await.unwrap().filename);
        }

        let listed: Vec<String> = fx
            .manager
            .list_backups()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.filename)
            .collect();
        created.reverse();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn test_list_backups_empty_when_dir_missing() {
        let fx = fixture().await;
        assert!(fx.manager.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean_old_backups_keeps_newest() {
        let fx = fixture().await;

        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(fx.manager.create_backup(&fx.source).await.unwrap().filename);
        }

        let removed = fx.manager.clean_old_backups(3).await.unwrap();
        assert_eq!(removed, 2);

        let remaining: Vec<String> = fx
            .manager
            .list_backups()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.filename)
            .collect();
        assert_eq!(remaining, vec![created[4].clone(), created[3].clone(), created[2].clone()]);

        // Sidecars of pruned snapshots are gone too
        let sidecar = fx.manager.backup_dir().join(sidecar_filename(&created[0]));
        assert!(!fs::try_exists(sidecar).await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_old_backups_retain_more_than_exist() {
        let fx = fixture().await;
        fx.manager.create_backup(&fx.source).await.unwrap();

        assert_eq!(fx.manager.clean_old_backups(5).await.unwrap(), 0);
        assert_eq!(fx.manager.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retention_counts_pre_restore_snapshots() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();
        let report = fx
            .manager
            .restore_from_backup(&receipt.filename, &fx.source)
            .await
            .unwrap();

        fx.manager.clean_old_backups(1).await.unwrap();

        let remaining = fx.manager.list_backups().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(Some(remaining[0].filename.clone()), report.safety_snapshot);
    }

    #[tokio::test]
    async fn test_create_backup_applies_max_backups() {
        let fx = fixture_with(SnapshotConfig {
            max_backups: Some(2),
            ..SnapshotConfig::new("unused")
        })
        .await;

        for _ in 0..4 {
            fx.manager.create_backup(&fx.source).await.unwrap();
        }

        assert_eq!(fx.manager.list_backups().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_backup() {
        let fx = fixture().await;
        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        fx.manager.delete_backup(&receipt.filename).await.unwrap();

        assert!(fx.manager.list_backups().await.unwrap().is_empty());
        assert!(matches!(
            fx.manager.delete_backup(&receipt.filename).await,
            Err(KitError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_backups_get_distinct_names() {
        let fx = fixture().await;

        let (a, b) = tokio::join!(
            fx.manager.create_backup(&fx.source),
            fx.manager.create_backup(&fx.source)
        );

        assert_ne!(a.unwrap().filename, b.unwrap().filename);
        assert_eq!(fx.manager.list_backups().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sidecar_write_failure_removes_snapshot_file() {
        let fx = fixture().await;
        fs::create_dir_all(fx.manager.backup_dir()).await.unwrap();
        let name = "20240101T000000.000000Z.snapshot";
        // A directory where the sidecar should go makes its rename fail
        fs::create_dir(fx.manager.backup_dir().join(sidecar_filename(name)))
            .await
            .unwrap();

        let metadata = SnapshotMetadata {
            hash: crypto::sha256_hex(b"test data"),
            timestamp: Utc::now(),
            size: 9,
            encrypted: false,
        };
        let result = fx.manager.write_pair(name, b"test data", &metadata).await;

        assert!(matches!(result, Err(KitError::Io(_))));
        assert!(!fs::try_exists(fx.manager.backup_dir().join(name)).await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_removes_snapshots_without_metadata() {
        let fx = fixture().await;
        fx.manager.create_backup(&fx.source).await.unwrap();
        let orphan = "20200101T000000.000000Z.snapshot";
        fs::write(fx.manager.backup_dir().join(orphan), b"orphan")
            .await
            .unwrap();

        let removed = fx.manager.clean_old_backups(0).await.unwrap();
        assert_eq!(removed, 2);

        let mut dir = fs::read_dir(fx.manager.backup_dir()).await.unwrap();
        let mut leftover = Vec::new();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            leftover.push(entry.file_name());
        }
        assert!(leftover.is_empty(), "left behind: {leftover:?}");
    }

    #[tokio::test]
    async fn test_retention_failure_does_not_fail_backup() {
        let fx = fixture_with(SnapshotConfig {
            max_backups: Some(1),
            ..SnapshotConfig::new("unused")
        })
        .await;

        // An older "snapshot" that cannot be deleted as a file
        fs::create_dir_all(fx.manager.backup_dir()).await.unwrap();
        let stuck = "20000101T000000.000000Z.snapshot";
        fs::create_dir(fx.manager.backup_dir().join(stuck)).await.unwrap();
        let metadata = SnapshotMetadata {
            hash: crypto::sha256_hex(b"old"),
            timestamp: Utc::now() - chrono::Duration::days(1),
            size: 3,
            encrypted: true,
        };
        fs::write(
            fx.manager.backup_dir().join(sidecar_filename(stuck)),
            serde_json::to_vec(&metadata).unwrap(),
        )
        .await
        .unwrap();

        let receipt = fx.manager.create_backup(&fx.source).await.unwrap();

        assert!(fs::try_exists(&receipt.path).await.unwrap());
        assert!(fx.manager.verify_backup(&receipt.filename).await.is_ok());
    }

    #[tokio::test]
    async fn test_auto_backup_takes_first_snapshot_immediately() {
        let fx = fixture().await;

        fx.manager
            .start_auto_backup(&fx.source, Duration::from_secs(5))
            .await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(fx.manager.list_backups().await.unwrap().len(), 1);
        assert!(fx.manager.stop_auto_backup().await);
    }

    #[tokio::test]
    async fn test_auto_backup_runs_and_stops() {
        let fx = fixture().await;

        fx.manager
            .start_auto_backup(&fx.source, Duration::from_millis(50))
            .await;
        assert!(fx.manager.is_auto_backup_running().await);

        tokio::time::sleep(Duration::from_millis(180)).await;
        assert!(fx.manager.stop_auto_backup().await);
        assert!(!fx.manager.stop_auto_backup().await);

        // Let a cycle that was already running finish
        tokio::time::sleep(Duration::from_millis(50)).await;
        let count = fx.manager.list_backups().await.unwrap().len();
        assert!(count >= 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fx.manager.list_backups().await.unwrap().len(), count);
    }

    #[tokio::test]
    async fn test_auto_backup_survives_failed_cycles() {
        let fx = fixture().await;
        let missing = fx.source.with_file_name("not-there.db");

        fx.manager
            .start_auto_backup(&missing, Duration::from_millis(30))
            .await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Still scheduled after failures; recovers once the source appears
        assert!(fx.manager.is_auto_backup_running().await);
        fs::write(&missing, b"late data").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(fx.manager.stop_auto_backup().await);
        assert!(!fx.manager.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_auto_backup_when_not_running() {
        let fx = fixture().await;
        assert!(!fx.manager.stop_auto_backup().await);
        assert!(!fx.manager.is_auto_backup_running().await);
    }
}
