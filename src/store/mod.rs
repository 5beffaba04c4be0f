//! Backing Store Module
//!
//! The key-value capability the cache layer coordinates through. Every
//! cross-process guarantee (lock exclusivity, index ordering, counters)
//! relies on these operations being atomic at the store.

mod client;
mod entry;
mod memory;
mod pattern;
mod sorted_set;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use client::StoreClient;
pub use entry::StoredValue;
pub use memory::MemoryStore;
pub use pattern::compile_pattern;
pub use sorted_set::SortedSet;

// == Sorted Set Insert Mode ==
/// How `zadd` treats a member that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZAddMode {
    /// Insert or overwrite the score
    Always,
    /// Insert only when the member is absent
    IfAbsent,
}

/// Remote key-value store consumed by the cache layer.
///
/// Implementations must make each call atomic with respect to other
/// callers sharing the same store. A TTL of zero seconds means the
/// entry does not expire.
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    /// Reads a live value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a value, replacing any previous value and TTL.
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;

    /// Deletes keys of any kind, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Checks whether a live key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Lists live keys matching a glob pattern (`*`, `?`, `[...]`, `\` escapes).
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>>;

    /// Writes `value` only if the current value equals `expected`
    /// (`None` meaning the key must be absent).
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool>;

    /// Deletes the key only if its current value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool>;

    /// Increments an integer counter, creating it at zero first.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Replaces the TTL of a live value. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Adds a member to a sorted set. Returns true if the score was written.
    async fn zadd(&self, key: &str, member: &str, score: f64, mode: ZAddMode) -> Result<bool>;

    /// Adds `delta` to a member's score, inserting it at zero first.
    async fn zincr(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Number of members in a sorted set.
    async fn zcard(&self, key: &str) -> Result<usize>;

    /// Removes and returns up to `count` members with the lowest scores.
    async fn zpop_min(&self, key: &str, count: usize) -> Result<Vec<String>>;

    /// Removes members from a sorted set, returning how many were present.
    async fn zrem(&self, key: &str, members: &[String]) -> Result<u64>;

    /// All members in ascending score order.
    async fn zmembers(&self, key: &str) -> Result<Vec<String>>;
}
