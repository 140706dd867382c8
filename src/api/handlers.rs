//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::SharedCache;
use crate::cipher::FieldCipher;
use crate::config::Config;
use crate::error::{KitError, Result};
use crate::models::{
    validate_key, BackupListResponse, CleanBackupsRequest, CleanBackupsResponse, DeleteResponse,
    FieldsRequest, FieldsResponse, HealthResponse, PrefetchStatus, PutValueRequest,
    RotateResponse, SetResponse, StatsResponse, ValueResponse,
};
use crate::prefetch::PrefetchScheduler;
use crate::snapshot::{BackupReceipt, RestoreReport, Snapshot, SnapshotManager};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache handle
    pub cache: SharedCache,
    /// Prefetch queue over `cache`
    pub prefetch: PrefetchScheduler,
    /// Snapshot manager
    pub snapshots: Arc<SnapshotManager>,
    /// Field cipher; rotation takes the write lock
    pub cipher: Arc<RwLock<FieldCipher>>,
    /// Data store file the backup endpoints operate on
    pub backup_source: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        cache: SharedCache,
        snapshots: SnapshotManager,
        cipher: FieldCipher,
        backup_source: Option<PathBuf>,
    ) -> Self {
        Self {
            prefetch: PrefetchScheduler::new(cache.clone()),
            cache,
            snapshots: Arc::new(snapshots),
            cipher: Arc::new(RwLock::new(cipher)),
            backup_source,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Snapshot and field keys are both derived from `encryption_key`. Field
    /// key versions 1 through `field_key_version` are available, the last one
    /// active.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = SharedCache::with_config(config.cache());
        let snapshots = SnapshotManager::new(config.snapshot(), &config.encryption_key)?;
        let cipher =
            FieldCipher::from_passphrase_at(&config.encryption_key, config.field_key_version)?;
        Ok(Self::new(
            cache,
            snapshots,
            cipher,
            config.backup_source.clone(),
        ))
    }

    fn source(&self) -> Result<&FsPath> {
        self.backup_source
            .as_deref()
            .ok_or_else(|| KitError::InvalidRequest("no backup source configured".to_string()))
    }
}

// == Health & Stats ==
/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.cache.stats().await,
        prefetch: PrefetchStatus {
            pending: state.prefetch.pending().await,
            processing: state.prefetch.is_processing().await,
        },
        auto_backup: state.snapshots.is_auto_backup_running().await,
    })
}

// == Cache ==
/// Handler for GET /cache/:key
pub async fn get_value_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>> {
    let value = state
        .cache
        .get(&key)
        .await
        .ok_or_else(|| KitError::NotFound(format!("key '{key}'")))?;

    Ok(Json(ValueResponse::new(key, value)))
}

/// Handler for PUT /cache/:key
///
/// A value larger than the whole cache budget is rejected with 400.
pub async fn put_value_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutValueRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(KitError::InvalidRequest(error_msg));
    }
    let (value, metadata) = req.into_value().map_err(KitError::InvalidRequest)?;

    let size = value.size_bytes();
    if !state.cache.set(key.clone(), value, metadata).await {
        return Err(KitError::InvalidRequest(format!(
            "value of {size} bytes exceeds the cache budget"
        )));
    }

    Ok(Json(SetResponse::new(key)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_value_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key).await {
        return Err(KitError::NotFound(format!("key '{key}'")));
    }

    Ok(Json(DeleteResponse::new(key)))
}

// == Backups ==
/// Handler for GET /backups
pub async fn list_backups_handler(
    State(state): State<AppState>,
) -> Result<Json<BackupListResponse>> {
    let backups = state.snapshots.list_backups().await?;
    Ok(Json(BackupListResponse::new(backups)))
}

/// Handler for POST /backups
///
/// Snapshots the configured backup source.
pub async fn create_backup_handler(State(state): State<AppState>) -> Result<Json<BackupReceipt>> {
    let receipt = state.snapshots.create_backup(state.source()?).await?;
    Ok(Json(receipt))
}

/// Handler for GET /backups/:filename/verify
pub async fn verify_backup_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Snapshot>> {
    let snapshot = state.snapshots.verify_backup(&filename).await?;
    Ok(Json(snapshot))
}

/// Handler for POST /backups/:filename/restore
///
/// Restores over the configured backup source.
pub async fn restore_backup_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<RestoreReport>> {
    let report = state
        .snapshots
        .restore_from_backup(&filename, state.source()?)
        .await?;
    Ok(Json(report))
}

/// Handler for DELETE /backups/:filename
pub async fn delete_backup_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.snapshots.delete_backup(&filename).await?;
    Ok(Json(DeleteResponse::new(filename)))
}

/// Handler for POST /backups/clean
pub async fn clean_backups_handler(
    State(state): State<AppState>,
    Json(req): Json<CleanBackupsRequest>,
) -> Result<Json<CleanBackupsResponse>> {
    let removed = state.snapshots.clean_old_backups(req.retain).await?;
    Ok(Json(CleanBackupsResponse {
        removed,
        retained: req.retain,
    }))
}

// == Fields ==
/// Handler for POST /fields/encrypt
pub async fn encrypt_fields_handler(
    State(state): State<AppState>,
    Json(req): Json<FieldsRequest>,
) -> Result<Json<FieldsResponse>> {
    let record = state.cipher.read().await.encrypt_fields(&req.record, &req.fields)?;
    Ok(Json(FieldsResponse::new(record)))
}

/// Handler for POST /fields/decrypt
pub async fn decrypt_fields_handler(
    State(state): State<AppState>,
    Json(req): Json<FieldsRequest>,
) -> Result<Json<FieldsResponse>> {
    let record = state.cipher.read().await.decrypt_fields(&req.record, &req.fields)?;
    Ok(Json(FieldsResponse::new(record)))
}

/// Handler for POST /fields/migrate
pub async fn migrate_fields_handler(
    State(state): State<AppState>,
    Json(req): Json<FieldsRequest>,
) -> Result<Json<FieldsResponse>> {
    let (record, migrated) = state.cipher.read().await.migrate_fields(&req.record, &req.fields)?;
    Ok(Json(FieldsResponse {
        record,
        migrated: Some(migrated),
    }))
}

/// Handler for POST /fields/rotate
pub async fn rotate_key_handler(State(state): State<AppState>) -> Result<Json<RotateResponse>> {
    let mut cipher = state.cipher.write().await;
    let active_version = cipher.rotate_key()?;
    info!(
        active_version,
        "Set FIELD_KEY_VERSION={active_version} to keep this key active across restarts"
    );
    Ok(Json(RotateResponse {
        active_version,
        known_versions: cipher.known_versions(),
    }))
}
