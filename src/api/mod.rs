//! API Module
//!
//! HTTP handlers and routing for the admin REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache, prefetch and auto-backup status
//! - `GET|PUT|DELETE /cache/:key` - Read, store or delete a cache entry
//! - `GET|POST /backups` - List snapshots or snapshot the configured source
//! - `POST /backups/clean` - Prune to the newest `retain` snapshots
//! - `GET /backups/:filename/verify` - Integrity-check a snapshot
//! - `POST /backups/:filename/restore` - Restore over the configured source
//! - `DELETE /backups/:filename` - Delete a snapshot
//! - `POST /fields/{encrypt,decrypt,migrate,rotate}` - Field cipher operations

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
