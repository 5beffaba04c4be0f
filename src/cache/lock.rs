//! Lock Manager Module
//!
//! Token-based mutual exclusion over the backing store. A lock is a
//! store key holding the holder's random token, set only if absent and
//! always with an expiry, so a crashed holder's lock heals on its own.
//! Release deletes the key only while it still holds the caller's token.

use std::time::Duration;

use tracing::debug;

use crate::cache::KeyCodec;
use crate::error::Result;
use crate::store::StoreClient;

/// Shortest expiry a lock may carry; a zero TTL would never expire.
const MIN_LOCK_TTL: Duration = Duration::from_millis(1);

// == Lock Manager ==
/// Acquires and releases per-key locks shared by every process on the store.
///
/// Locks are neither reentrant nor counted: a second `acquire` with a new
/// token fails while the first lock is live, whoever issues it.
#[derive(Clone)]
pub struct LockManager {
    store: StoreClient,
    codec: KeyCodec,
}

impl LockManager {
    pub fn new(store: StoreClient, codec: KeyCodec) -> Self {
        Self { store, codec }
    }

    /// Generates a 128-bit random holder token.
    pub fn new_token() -> String {
        format!("{:032x}", rand::random::<u128>())
    }

    // == Acquire ==
    /// Takes the lock for `key` if no live lock exists.
    ///
    /// Returns true iff this call created the lock.
    pub async fn acquire(&self, key: &str, token: &str, timeout: Duration) -> Result<bool> {
        let lock_key = self.codec.lock_key(key);
        let acquired = self
            .store
            .compare_and_set(
                &lock_key,
                None,
                token.as_bytes().to_vec(),
                timeout.max(MIN_LOCK_TTL),
            )
            .await?;

        debug!(lock = %lock_key, acquired, "Lock acquire attempt");
        Ok(acquired)
    }

    // == Release ==
    /// Deletes the lock only if it still holds `token`.
    ///
    /// Returns false, leaving the lock untouched, when the lock expired or
    /// now belongs to another holder.
    pub async fn release(&self, key: &str, token: &str) -> Result<bool> {
        let lock_key = self.codec.lock_key(key);
        let released = self
            .store
            .compare_and_delete(&lock_key, token.as_bytes())
            .await?;

        debug!(lock = %lock_key, released, "Lock release attempt");
        Ok(released)
    }

    /// True while any holder owns the lock for `key`.
    pub async fn is_locked(&self, key: &str) -> Result<bool> {
        self.store.exists(&self.codec.lock_key(key)).await
    }
}
