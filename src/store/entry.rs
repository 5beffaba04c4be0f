//! Stored Value Module
//!
//! Defines a single value held by the in-process store, with TTL support.

use std::time::Duration;

// == Stored Value ==
/// A value plus the bookkeeping the store needs to expire it.
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// Raw payload
    pub data: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredValue {
    // == Constructor ==
    /// Creates a new value with optional TTL.
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl.map(|ttl| now + ttl.as_millis() as u64);

        Self {
            data,
            created_at: now,
            expires_at,
        }
    }

    /// Creates a value from a TTL in whole seconds; zero means no expiry.
    pub fn with_ttl_secs(data: Vec<u8>, ttl_secs: u64) -> Self {
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        Self::new(data, ttl)
    }

    // == Is Expired ==
    /// Checks if the value has expired.
    ///
    /// A value is expired once the current time reaches the expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
