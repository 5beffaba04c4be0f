//! Eviction Index Module
//!
//! Tracks recency, frequency or insertion order of cache keys in a sorted
//! set on the backing store, and trims it to a size bound.
//!
//! Scores per strategy:
//! - LRU: wall-clock time of the last access
//! - LFU: previous score + 1, never decayed
//! - FIFO: wall-clock time of the first write, never updated

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::cache::KeyCodec;
use crate::config::EvictionStrategy;
use crate::error::Result;
use crate::store::{StoreClient, ZAddMode};

// == Score Clock ==
/// Wall-clock microseconds, nudged forward so two stamps from this process never tie.
#[derive(Debug, Default)]
pub struct ScoreClock {
    last: AtomicU64,
}

impl ScoreClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&self) -> f64 {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1) as f64
    }
}

// == Eviction Index ==
/// Ordered record of tracked keys for the configured strategy.
#[derive(Clone)]
pub struct EvictionIndex {
    store: StoreClient,
    strategy: EvictionStrategy,
    index_key: String,
    max_size: usize,
    clock: Arc<ScoreClock>,
}

impl EvictionIndex {
    pub fn new(
        store: StoreClient,
        codec: &KeyCodec,
        strategy: EvictionStrategy,
        max_size: usize,
    ) -> Self {
        Self {
            store,
            strategy,
            index_key: codec.index_key(strategy),
            max_size,
            clock: Arc::new(ScoreClock::new()),
        }
    }

    pub fn strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_enabled(&self) -> bool {
        self.strategy != EvictionStrategy::None
    }

    // == Record ==
    /// Inserts or updates the key's score for the active strategy.
    pub async fn record(&self, key: &str) -> Result<()> {
        match self.strategy {
            EvictionStrategy::Lru => {
                self.store
                    .zadd(&self.index_key, key, self.clock.stamp(), ZAddMode::Always)
                    .await?;
            }
            EvictionStrategy::Lfu => {
                self.store.zincr(&self.index_key, key, 1.0).await?;
            }
            EvictionStrategy::Fifo => {
                self.store
                    .zadd(&self.index_key, key, self.clock.stamp(), ZAddMode::IfAbsent)
                    .await?;
            }
            EvictionStrategy::None => {}
        }
        Ok(())
    }

    // == Prune ==
    /// Pops lowest-scored keys until at most `max_size` remain.
    ///
    /// Returns the evicted keys so their entries can be deleted too.
    pub async fn prune(&self, max_size: usize) -> Result<Vec<String>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        let size = self.store.zcard(&self.index_key).await?;
        if size <= max_size {
            return Ok(Vec::new());
        }

        let evicted = self.store.zpop_min(&self.index_key, size - max_size).await?;
        debug!(
            "Eviction index ({}) trimmed {} keys to bound {}",
            self.strategy.as_str(),
            evicted.len(),
            max_size
        );
        Ok(evicted)
    }

    /// Prunes against the configured bound.
    pub async fn enforce_bound(&self) -> Result<Vec<String>> {
        self.prune(self.max_size).await
    }

    /// Drops keys whose entries were removed by another path.
    pub async fn remove(&self, keys: &[String]) -> Result<u64> {
        if !self.is_enabled() {
            return Ok(0);
        }
        self.store.zrem(&self.index_key, keys).await
    }

    /// Tracked keys from first-to-evict to last.
    pub async fn tracked(&self) -> Result<Vec<String>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        self.store.zmembers(&self.index_key).await
    }

    pub async fn len(&self) -> Result<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }
        self.store.zcard(&self.index_key).await
    }
}
