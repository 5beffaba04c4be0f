//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for pattern invalidation (POST /invalidate)
///
/// # Fields
/// - `pattern`: glob over logical keys, e.g. `sales:*`
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Glob pattern, namespaced by the service
    pub pattern: String,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.trim().is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        None
    }
}
