//! In-Process Store Module
//!
//! HashMap-backed implementation of the backing store capability with lazy
//! TTL expiration, counters and sorted sets. Atomicity comes from holding
//! the state lock for the whole of each operation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::entry::current_timestamp_ms;
use super::{compile_pattern, BackingStore, SortedSet, StoredValue, ZAddMode};
use crate::error::{CacheError, Result};

#[derive(Debug, Default)]
struct StoreState {
    /// Plain values and counters
    values: HashMap<String, StoredValue>,
    /// Sorted sets (never expire)
    sorted: HashMap<String, SortedSet>,
}

impl StoreState {
    /// Returns a live value, dropping it first if it has expired.
    fn live_value(&mut self, key: &str) -> Option<&StoredValue> {
        let now = current_timestamp_ms();
        if self.values.get(key).is_some_and(|v| v.is_expired_at(now)) {
            self.values.remove(key);
        }
        self.values.get(key)
    }

    fn purge_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.values.len();
        self.values.retain(|_, value| !value.is_expired_at(now));
        before - self.values.len()
    }
}

// == Memory Store ==
/// Single-process backing store.
///
/// Shared by cloning an `Arc<MemoryStore>`; suitable for one process, and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Purge Expired ==
    /// Removes all expired values.
    ///
    /// Returns the number of values removed.
    pub async fn purge_expired(&self) -> usize {
        self.state.write().await.purge_expired()
    }

    // == Length ==
    /// Number of stored values and sorted sets, expired values included.
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.values.len() + state.sorted.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.write().await;
        Ok(state.live_value(key).map(|value| value.data.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .values
            .insert(key.to_string(), StoredValue::with_ttl_secs(value, ttl_secs));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut state = self.state.write().await;
        let now = current_timestamp_ms();
        let mut removed = 0;

        for key in keys {
            if let Some(value) = state.values.remove(key) {
                if !value.is_expired_at(now) {
                    removed += 1;
                }
            }
            if state.sorted.remove(key).is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.live_value(key).is_some() || state.sorted.contains_key(key))
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = compile_pattern(pattern)?;
        let mut state = self.state.write().await;

        let purged = state.purge_expired();
        if purged > 0 {
            debug!("Memory store purged {} expired values during scan", purged);
        }

        let mut keys: Vec<String> = state
            .values
            .keys()
            .chain(state.sorted.keys())
            .filter(|key| matcher.is_match(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let current = state.live_value(key).map(|v| v.data.as_slice());

        if current != expected {
            return Ok(false);
        }

        let ttl = (!ttl.is_zero()).then_some(ttl);
        state
            .values
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let mut state = self.state.write().await;
        let matches = state
            .live_value(key)
            .is_some_and(|v| v.data.as_slice() == expected);

        if matches {
            state.values.remove(key);
        }
        Ok(matches)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut state = self.state.write().await;

        let (current, expires_at) = match state.live_value(key) {
            Some(value) => {
                let text = std::str::from_utf8(&value.data).map_err(|_| {
                    CacheError::InvalidRequest(format!("Value at '{}' is not an integer", key))
                })?;
                let number: i64 = text.parse().map_err(|_| {
                    CacheError::InvalidRequest(format!("Value at '{}' is not an integer", key))
                })?;
                (number, value.expires_at)
            }
            None => (0, None),
        };

        let next = current + 1;
        let mut stored = StoredValue::new(next.to_string().into_bytes(), None);
        stored.expires_at = expires_at;
        state.values.insert(key.to_string(), stored);
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.live_value(key).is_none() {
            return Ok(false);
        }

        let expires_at = (ttl_secs > 0).then(|| current_timestamp_ms() + ttl_secs * 1000);
        if let Some(value) = state.values.get_mut(key) {
            value.expires_at = expires_at;
        }
        Ok(true)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64, mode: ZAddMode) -> Result<bool> {
        let mut state = self.state.write().await;
        let set = state.sorted.entry(key.to_string()).or_default();

        if mode == ZAddMode::IfAbsent && set.contains(member) {
            return Ok(false);
        }
        set.insert(member, score);
        Ok(true)
    }

    async fn zincr(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut state = self.state.write().await;
        Ok(state
            .sorted
            .entry(key.to_string())
            .or_default()
            .increment(member, delta))
    }

    async fn zcard(&self, key: &str) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state.sorted.get(key).map_or(0, SortedSet::len))
    }

    async fn zpop_min(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let mut state = self.state.write().await;
        let Some(set) = state.sorted.get_mut(key) else {
            return Ok(Vec::new());
        };

        let popped: Vec<String> = std::iter::from_fn(|| set.pop_min()).take(count).collect();
        if set.is_empty() {
            state.sorted.remove(key);
        }
        Ok(popped)
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut state = self.state.write().await;
        let Some(set) = state.sorted.get_mut(key) else {
            return Ok(0);
        };

        let removed = members.iter().filter(|m| set.remove(m)).count() as u64;
        if set.is_empty() {
            state.sorted.remove(key);
        }
        Ok(removed)
    }

    async fn zmembers(&self, key: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .sorted
            .get(key)
            .map(|set| set.members().map(str::to_string).collect())
            .unwrap_or_default())
    }
}
