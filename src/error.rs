//! Error types for the cache coordination layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache coordination layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store unreachable or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Serialized payload exceeds the configured entry limit
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// `get_with_lock` gave up waiting for another holder to fill the key
    #[error("Lock contention exhausted for '{key}' after waiting {waited_ms}ms")]
    LockContentionExhausted { key: String, waited_ms: u64 },

    /// Failure raised by a caller-supplied generator, passed through untouched
    #[error(transparent)]
    Generator(anyhow::Error),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),
}

impl CacheError {
    /// True for errors that originate in the backing store rather than the caller.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, CacheError::StoreUnavailable(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::LockContentionExhausted { .. } => StatusCode::CONFLICT,
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Generator(_) | CacheError::Serialization(_) => {
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
/// Convenience Result type for the cache coordination layer.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_error_is_verbatim() {
        let err = CacheError::Generator(anyhow::anyhow!("forecast model offline"));
        assert_eq!(err.to_string(), "forecast model offline");
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (CacheError::NotFound("key".to_string()), StatusCode::NOT_FOUND),
            (CacheError::InvalidRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (
                CacheError::PayloadTooLarge { size: 11, limit: 10 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                CacheError::LockContentionExhausted {
                    key: "k".to_string(),
                    waited_ms: 600,
                },
                StatusCode::CONFLICT,
            ),
            (
                CacheError::StoreUnavailable("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::Generator(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);
        }
    }

    #[test]
    fn test_store_failure_classification() {
        assert!(CacheError::StoreUnavailable("x".into()).is_store_failure());
        assert!(!CacheError::NotFound("x".into()).is_store_failure());
    }
}
