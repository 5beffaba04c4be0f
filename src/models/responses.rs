//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies. Statistics and
//! entry metadata are served as `CacheStats` and `EntryMetadata` directly.

use serde::Serialize;

use crate::cache::EntryMetadata;

/// Response body for DELETE /keys/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// The namespaced key
    pub key: String,
    /// Whether an entry existed and was removed
    pub removed: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, removed: bool) -> Self {
        Self {
            key: key.into(),
            removed,
        }
    }
}

/// Response body for POST /invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// The pattern as received
    pub pattern: String,
    /// Number of entries deleted
    pub removed: u64,
}

impl InvalidateResponse {
    pub fn new(pattern: impl Into<String>, removed: u64) -> Self {
        Self {
            pattern: pattern.into(),
            removed,
        }
    }
}

/// Response body for GET /keys/:key/meta
#[derive(Debug, Clone, Serialize)]
pub struct MetadataResponse {
    /// The namespaced key
    pub key: String,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
}

/// Response body for the health endpoint (GET /health)
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
