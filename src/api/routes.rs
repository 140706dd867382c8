//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clean_backups_handler, create_backup_handler, decrypt_fields_handler, delete_backup_handler,
    delete_value_handler, encrypt_fields_handler, get_value_handler, health_handler,
    list_backups_handler, migrate_fields_handler, put_value_handler, restore_backup_handler,
    rotate_key_handler, stats_handler, verify_backup_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route(
            "/cache/:key",
            get(get_value_handler)
                .put(put_value_handler)
                .delete(delete_value_handler),
        )
        .route(
            "/backups",
            get(list_backups_handler).post(create_backup_handler),
        )
        .route("/backups/clean", post(clean_backups_handler))
        .route("/backups/:filename", delete(delete_backup_handler))
        .route("/backups/:filename/verify", get(verify_backup_handler))
        .route("/backups/:filename/restore", post(restore_backup_handler))
        .route("/fields/encrypt", post(encrypt_fields_handler))
        .route("/fields/decrypt", post(decrypt_fields_handler))
        .route("/fields/migrate", post(migrate_fields_handler))
        .route("/fields/rotate", post(rotate_key_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
