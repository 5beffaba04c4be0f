//! Cache Statistics Module
//!
//! Process-local counters for hits, misses, writes, deletes, errors and
//! evictions. Best-effort and never persisted: a restart starts from zero.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

// == Stats Tracker ==
/// Shared, lock-free counters updated from every request path.
#[derive(Debug)]
pub struct StatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    evictions: AtomicU64,
    /// Start of the current counting window (Unix milliseconds)
    started_at_ms: AtomicI64,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    // == Constructor ==
    /// Creates a tracker with all counters at zero, starting now.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            started_at_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    // == Reset ==
    /// Zeroes every counter and restarts the window. Operator action only.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.writes,
            &self.deletes,
            &self.errors,
            &self.evictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.started_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Point-in-time copy of the counters with derived values.
    pub fn snapshot(&self) -> CacheStats {
        let started_at = Utc
            .timestamp_millis_opt(self.started_at_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or_else(Utc::now);

        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: 0.0,
            started_at,
            uptime_seconds: (Utc::now() - started_at).num_seconds().max(0),
        };
        stats.hit_rate = stats.compute_hit_rate();
        stats
    }
}

// == Cache Stats ==
/// Snapshot returned by `get_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Reads that found a live entry
    pub hits: u64,
    /// Reads that found nothing, including reads failed open
    pub misses: u64,
    /// Successful write-throughs
    pub writes: u64,
    /// Entries removed by delete or invalidation
    pub deletes: u64,
    /// Store failures that were logged and swallowed
    pub errors: u64,
    /// Entries removed by the eviction index
    pub evictions: u64,
    /// hits / (hits + misses), 0 when there were no reads
    pub hit_rate: f64,
    /// Start of the counting window
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`
    pub uptime_seconds: i64,
}

impl CacheStats {
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    fn compute_hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}
