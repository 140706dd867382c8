//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{CacheValue, Metadata};
use crate::cipher::Record;

const MAX_KEY_LEN: usize = 256;

/// Validates a cache key taken from the path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LEN {
        return Some(format!(
            "Key exceeds maximum length of {MAX_KEY_LEN} characters"
        ));
    }
    None
}

/// Request body for `PUT /cache/:key`
///
/// A string `value` is stored as text, anything else as JSON. With
/// `base64: true` the string is decoded and stored as raw bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct PutValueRequest {
    /// The value to store
    pub value: Value,
    /// Optional entry metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
    /// Treat `value` as base64-encoded bytes
    #[serde(default)]
    pub base64: bool,
}

impl PutValueRequest {
    /// Converts the body into a cache value.
    pub fn into_value(self) -> Result<(CacheValue, Option<Metadata>), String> {
        let value = match (self.base64, self.value) {
            (true, Value::String(encoded)) => STANDARD
                .decode(encoded)
                .map(CacheValue::Bytes)
                .map_err(|e| format!("value is not valid base64: {e}"))?,
            (true, _) => return Err("base64 values must be strings".to_string()),
            (false, Value::String(text)) => CacheValue::Text(text),
            (false, other) => CacheValue::Json(other),
        };
        Ok((value, self.metadata))
    }
}

/// Request body for `POST /backups/clean`
#[derive(Debug, Clone, Deserialize)]
pub struct CleanBackupsRequest {
    /// Number of newest snapshots to keep
    pub retain: usize,
}

/// Request body for `POST /fields/encrypt`, `/fields/decrypt` and `/fields/migrate`
#[derive(Debug, Clone, Deserialize)]
pub struct FieldsRequest {
    /// Flat record to transform
    pub record: Record,
    /// Names of the fields to transform
    pub fields: Vec<String>,
}
