//! Cache Service Module
//!
//! The accessor every caller goes through: plain reads and writes,
//! invalidation, cache-aside and stampede-safe cache-aside.
//!
//! Store failures never reach the caller here. Reads degrade to misses,
//! writes and deletes are logged and counted, so the worst a broken store
//! can do is make the cache look empty. Only generator failures and lock
//! contention are returned as errors.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEvent, CacheStats, CleanupReport, EntryMetadata, EventBus, EvictionIndex, KeyCodec,
    LockManager, MetadataTracker, StatsTracker, TtlResolver,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::{BackingStore, StoreClient};

// == Cache Service ==
/// Coordinates cache access for every worker sharing one backing store.
///
/// Build it once at startup and clone it into callers; clones share the
/// store handle, counters and event channel.
#[derive(Clone)]
pub struct CacheService {
    store: StoreClient,
    codec: KeyCodec,
    ttl: Arc<TtlResolver>,
    index: EvictionIndex,
    locks: LockManager,
    metadata: MetadataTracker,
    stats: Arc<StatsTracker>,
    events: EventBus,
    max_entry_bytes: usize,
    lock_timeout: Duration,
    lock_wait_schedule: Arc<Vec<Duration>>,
}

impl CacheService {
    // == Constructor ==
    /// Creates a service over `store` using the given configuration.
    pub fn new(config: &Config, store: Arc<dyn BackingStore>) -> Self {
        let store = StoreClient::new(store, Duration::from_millis(config.store_timeout_ms));
        let codec = KeyCodec::new(config.namespace.clone());

        Self {
            index: EvictionIndex::new(
                store.clone(),
                &codec,
                config.eviction_strategy,
                config.max_tracked_keys,
            ),
            locks: LockManager::new(store.clone(), codec.clone()),
            metadata: MetadataTracker::new(store.clone(), codec.clone()),
            ttl: Arc::new(TtlResolver::new(
                config.default_ttl,
                config.ttl_overrides.clone(),
            )),
            stats: Arc::new(StatsTracker::new()),
            events: EventBus::default(),
            max_entry_bytes: config.max_entry_bytes,
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            lock_wait_schedule: Arc::new(
                config
                    .lock_wait_schedule_ms
                    .iter()
                    .map(|ms| Duration::from_millis(*ms))
                    .collect(),
            ),
            store,
            codec,
        }
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn index(&self) -> &EvictionIndex {
        &self.index
    }

    /// Subscribes to bulk change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: CacheEvent) {
        self.events.publish(event);
    }

    // == Get ==
    /// Reads a value, counting a hit or a miss.
    ///
    /// Store errors and undecodable payloads are reported as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.codec.build_key(key);

        match self.store.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_slice::<T>(&raw) {
                Ok(value) => {
                    self.stats.record_hit();
                    self.touch(full_key).await;
                    Some(value)
                }
                Err(e) => {
                    warn!("Cache entry '{}' could not be decoded: {}", full_key, e);
                    self.stats.record_error();
                    self.stats.record_miss();
                    None
                }
            },
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(e) => {
                warn!("Cache read for '{}' failed open: {}", full_key, e);
                self.stats.record_error();
                self.stats.record_miss();
                None
            }
        }
    }

    /// Records a hit in the eviction index, then updates metadata off the caller's path.
    ///
    /// The index update completes before `get` returns so the next eviction
    /// pass sees it.
    async fn touch(&self, full_key: String) {
        if self.index.is_enabled() {
            if let Err(e) = self.index.record(&full_key).await {
                warn!("Eviction index update for '{}' failed: {}", full_key, e);
                self.stats.record_error();
            }
        }

        let metadata = self.metadata.clone();
        tokio::spawn(async move {
            if let Err(e) = metadata.record_access(&full_key).await {
                debug!("Metadata update for '{}' failed: {}", full_key, e);
            }
        });
    }

    // == Set ==
    /// Writes a value through to the store.
    ///
    /// Returns false, after logging, when the write was rejected or failed.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        match self.try_set(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write for '{}' rejected: {}", key, e);
                self.stats.record_error();
                false
            }
        }
    }

    /// Like [`set`](Self::set) but reports why a write did not happen.
    pub async fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.write_payload(key, payload, ttl).await
    }

    async fn write_payload(&self, key: &str, payload: Vec<u8>, ttl: Option<u64>) -> Result<()> {
        let full_key = self.codec.build_key(key);
        if self.codec.is_internal(&full_key) {
            return Err(CacheError::InvalidRequest(format!(
                "Key '{}' is reserved for internal use",
                key
            )));
        }

        let size = payload.len();
        if size > self.max_entry_bytes {
            return Err(CacheError::PayloadTooLarge {
                size,
                limit: self.max_entry_bytes,
            });
        }

        let ttl_secs = self.ttl.resolve(self.codec.logical_key(&full_key), ttl);
        self.store.set_with_ttl(&full_key, payload, ttl_secs).await?;
        self.stats.record_write();
        debug!("Cached '{}' ({} bytes, ttl {}s)", full_key, size, ttl_secs);

        if let Err(e) = self.metadata.record_write(&full_key, size, ttl_secs).await {
            debug!("Metadata write for '{}' failed: {}", full_key, e);
        }
        self.track_write(&full_key).await;
        Ok(())
    }

    /// Records the write in the index and runs one eviction pass.
    async fn track_write(&self, full_key: &str) {
        if !self.index.is_enabled() {
            return;
        }
        if let Err(e) = self.index.record(full_key).await {
            warn!("Eviction index update for '{}' failed: {}", full_key, e);
            self.stats.record_error();
            return;
        }

        let evicted = match self.index.enforce_bound().await {
            Ok(evicted) => evicted,
            Err(e) => {
                warn!("Eviction pass failed: {}", e);
                self.stats.record_error();
                return;
            }
        };
        if evicted.is_empty() {
            return;
        }

        match self.store.delete(&evicted).await {
            Ok(_) => {
                self.stats.record_evictions(evicted.len() as u64);
                if let Err(e) = self.metadata.remove(&evicted).await {
                    debug!("Metadata cleanup after eviction failed: {}", e);
                }
                debug!("Evicted {} entries to respect the index bound", evicted.len());
                self.publish(CacheEvent::Evicted { keys: evicted });
            }
            Err(e) => {
                warn!("Deleting {} evicted entries failed: {}", evicted.len(), e);
                self.stats.record_error();
            }
        }
    }

    // == Delete ==
    /// Removes an entry with its metadata and index record.
    ///
    /// Returns true if an entry was removed. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> bool {
        let full_key = self.codec.build_key(key);

        match self.store.delete(std::slice::from_ref(&full_key)).await {
            Ok(removed) => {
                self.stats.record_deletes(removed);
                self.forget(std::slice::from_ref(&full_key)).await;
                removed > 0
            }
            Err(e) => {
                warn!("Cache delete for '{}' failed: {}", full_key, e);
                self.stats.record_error();
                false
            }
        }
    }

    /// Drops tracking records for keys that no longer have entries.
    async fn forget(&self, full_keys: &[String]) {
        if let Err(e) = self.metadata.remove(full_keys).await {
            debug!("Metadata cleanup failed: {}", e);
        }
        if let Err(e) = self.index.remove(full_keys).await {
            debug!("Eviction index cleanup failed: {}", e);
        }
    }

    // == Invalidate Pattern ==
    /// Deletes every entry in the namespace matching a glob pattern.
    ///
    /// Returns the number of entries removed; no match is not an error.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let full_pattern = self.codec.build_pattern(pattern);

        let keys: Vec<String> = match self.store.keys_matching(&full_pattern).await {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| !self.codec.is_internal(key))
                .collect(),
            Err(e) => {
                warn!("Pattern invalidation '{}' failed: {}", full_pattern, e);
                self.stats.record_error();
                return 0;
            }
        };

        let removed = match self.store.delete(&keys).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Pattern invalidation '{}' failed: {}", full_pattern, e);
                self.stats.record_error();
                return 0;
            }
        };

        self.stats.record_deletes(removed);
        self.forget(&keys).await;
        info!("Invalidated {} entries matching '{}'", removed, full_pattern);
        self.publish(CacheEvent::Invalidated {
            pattern: full_pattern,
            removed,
        });
        removed
    }

    // == Get Or Set ==
    /// Cache-aside read: on a miss, runs `generator` once and writes its result.
    ///
    /// No coordination with other callers. A null result is returned but not
    /// cached; a generator error is returned as-is and nothing is cached.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, generator: F, ttl: Option<u64>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = generator().await.map_err(CacheError::Generator)?;
        self.store_generated(key, &value, ttl).await;
        Ok(value)
    }

    /// Writes a generated value unless it serializes to null.
    async fn store_generated<T: Serialize>(&self, key: &str, value: &T, ttl: Option<u64>) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Generated value for '{}' is not serializable: {}", key, e);
                self.stats.record_error();
                return;
            }
        };
        if payload == b"null" {
            return;
        }

        if let Err(e) = self.write_payload(key, payload, ttl).await {
            warn!("Cache write for '{}' rejected: {}", key, e);
            self.stats.record_error();
        }
    }

    // == Get With Lock ==
    /// Stampede-safe cache-aside read.
    ///
    /// On a miss only the caller holding the key's lock runs `generator`.
    /// Everyone else waits through the configured schedule, re-reading between
    /// waits, and gets [`CacheError::LockContentionExhausted`] if the value
    /// never shows up. A waiter that sees the lock released with nothing
    /// cached tries to take the lock itself. `lock_timeout` overrides the
    /// configured lock expiry.
    pub async fn get_with_lock<T, F, Fut>(
        &self,
        key: &str,
        generator: F,
        ttl: Option<u64>,
        lock_timeout: Option<Duration>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let token = LockManager::new_token();
        let timeout = lock_timeout.unwrap_or(self.lock_timeout);
        let mut schedule = self.lock_wait_schedule.iter();
        let mut waited = Duration::ZERO;

        loop {
            match self.locks.acquire(key, &token, timeout).await {
                Ok(true) => break,
                Ok(false) => {
                    let filled = self
                        .wait_for_holder(key, &mut schedule, &mut waited)
                        .await?;
                    if let Some(value) = filled {
                        return Ok(value);
                    }
                }
                Err(e) => {
                    // No coordination possible; behave as an empty cache.
                    warn!("Lock for '{}' unavailable, computing uncached: {}", key, e);
                    self.stats.record_error();
                    return generator().await.map_err(CacheError::Generator);
                }
            }
        }

        // A racer may have filled the key between the first read and the lock.
        if let Some(value) = self.get(key).await {
            self.release_lock(key, &token).await;
            return Ok(value);
        }

        let outcome = generator().await;
        if let Ok(value) = &outcome {
            self.store_generated(key, value, ttl).await;
        }
        self.release_lock(key, &token).await;

        outcome.map_err(CacheError::Generator)
    }

    /// Re-reads on the wait schedule while another caller generates.
    ///
    /// Returns None when the lock was released without a value being
    /// cached, e.g. after a null result or a generator error. The schedule
    /// is shared across retries so total waiting stays bounded.
    async fn wait_for_holder<T: DeserializeOwned>(
        &self,
        key: &str,
        schedule: &mut std::slice::Iter<'_, Duration>,
        waited: &mut Duration,
    ) -> Result<Option<T>> {
        for delay in schedule.by_ref() {
            tokio::time::sleep(*delay).await;
            *waited += *delay;

            if let Some(value) = self.get(key).await {
                debug!("'{}' filled by lock holder after {}ms", key, waited.as_millis());
                return Ok(Some(value));
            }
            if let Ok(false) = self.locks.is_locked(key).await {
                debug!("Lock for '{}' released with nothing cached", key);
                return Ok(None);
            }
        }

        Err(CacheError::LockContentionExhausted {
            key: key.to_string(),
            waited_ms: waited.as_millis() as u64,
        })
    }

    async fn release_lock(&self, key: &str, token: &str) {
        match self.locks.release(key, token).await {
            Ok(true) => {}
            Ok(false) => warn!("Lock for '{}' expired before release", key),
            Err(e) => {
                warn!("Lock release for '{}' failed, left to expire: {}", key, e);
                self.stats.record_error();
            }
        }
    }

    // == Stats ==
    /// Point-in-time counters with the derived hit rate.
    pub fn get_stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Zeroes the counters. Operator action.
    pub fn reset_stats(&self) {
        info!("Cache statistics reset");
        self.stats.reset();
    }

    pub(crate) fn record_error(&self) {
        self.stats.record_error();
    }

    // == Diagnostics ==
    /// Metadata for a live entry.
    pub async fn metadata(&self, key: &str) -> Result<Option<EntryMetadata>> {
        let full_key = self.codec.build_key(key);
        if !self.store.exists(&full_key).await? {
            return Ok(None);
        }
        self.metadata.load(&full_key).await
    }

    /// Checks whether an entry exists without touching hit/miss counters.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.store.exists(&self.codec.build_key(key)).await
    }

    // == Sweep ==
    /// Removes tracking records whose entries no longer exist.
    ///
    /// Expiry in the store stays authoritative; this only stops metadata
    /// and index records from piling up behind it.
    pub async fn sweep_stale(&self) -> CleanupReport {
        let mut candidates = BTreeSet::new();

        match self.index.tracked().await {
            Ok(keys) => candidates.extend(keys),
            Err(e) => warn!("Cleaner could not list the eviction index: {}", e),
        }
        match self.metadata.tracked_entries().await {
            Ok(keys) => candidates.extend(keys),
            Err(e) => warn!("Cleaner could not list metadata records: {}", e),
        }

        let mut report = CleanupReport {
            scanned: candidates.len(),
            removed: 0,
        };
        let mut stale = Vec::new();

        for key in candidates {
            match self.store.exists(&key).await {
                Ok(false) => stale.push(key),
                Ok(true) => {}
                Err(e) => {
                    warn!("Cleaner aborted after store failure: {}", e);
                    self.stats.record_error();
                    break;
                }
            }
        }

        if !stale.is_empty() {
            self.forget(&stale).await;
            report.removed = stale.len();
        }
        self.publish(CacheEvent::CleanupCompleted(report.clone()));
        report
    }
}
