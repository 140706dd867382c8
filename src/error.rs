//! Error types for the resource toolkit
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Kit Error Enum ==
/// Unified error type for the cache, snapshot and cipher components.
///
/// A cache item that is too large is not an error: `BoundedCache::set`
/// reports it by returning `false`.
#[derive(Error, Debug)]
pub enum KitError {
    /// File read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cipher failure while sealing data
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Malformed ciphertext, failed authentication or unknown key version
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Snapshot failed its integrity check before restore
    #[error("snapshot invalid: {0}")]
    InvalidBackup(String),

    /// Key or snapshot not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for KitError {
    fn into_response(self) -> Response {
        let status = match &self {
            KitError::NotFound(_) => StatusCode::NOT_FOUND,
            KitError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            KitError::Decryption(_) => StatusCode::BAD_REQUEST,
            KitError::InvalidBackup(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KitError::Io(_) | KitError::Encryption(_) | KitError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the toolkit.
pub type Result<T> = std::result::Result<T, KitError>;
