//! Cache Entry Module
//!
//! Defines cached values, their size estimate and per-entry metadata.

use std::time::Duration;

use serde_json::{Map, Value};

/// Free-form metadata attached to an entry.
pub type Metadata = Map<String, Value>;

// == Cache Value ==
/// A cached payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// Raw binary payload
    Bytes(Vec<u8>),
    /// Text payload
    Text(String),
    /// Structured payload
    Json(Value),
}

impl CacheValue {
    /// Estimated in-memory size used against the cache budget.
    ///
    /// Binary payloads count their byte length. Text counts two bytes per
    /// UTF-16 code unit and structured values count two bytes per UTF-16 code
    /// unit of their serialized JSON. The estimate is kept as-is so capacity
    /// behaves the same as for data sized by existing clients.
    pub fn size_bytes(&self) -> u64 {
        match self {
            CacheValue::Bytes(bytes) => bytes.len() as u64,
            CacheValue::Text(text) => utf16_len(text) * 2,
            CacheValue::Json(value) => utf16_len(&value.to_string()) * 2,
        }
    }
}

fn utf16_len(text: &str) -> u64 {
    text.encode_utf16().count() as u64
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Text(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        CacheValue::Bytes(value)
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        CacheValue::Json(value)
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// The stored value
    pub value: CacheValue,
    /// Size charged against the cache budget
    pub size_bytes: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Caller-supplied metadata
    pub metadata: Metadata,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(key: String, value: CacheValue, metadata: Metadata) -> Self {
        let size_bytes = value.size_bytes();
        Self {
            key,
            value,
            size_bytes,
            created_at: current_timestamp_ms(),
            metadata,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since creation.
    pub fn age_ms(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.created_at)
    }

    // == Is Expired ==
    /// Checks if the entry is older than `max_age`.
    ///
    /// Boundary condition: an entry whose age equals `max_age` exactly is still
    /// valid; it expires once the age is strictly greater.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.age_ms() > max_age.as_millis() as u64
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
