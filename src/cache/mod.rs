//! Cache Module
//!
//! Shared-store caching for POS analytics: namespaced keys, per-prefix
//! TTLs, stampede locks, a bounded eviction index and hit/miss counters.

mod eviction;
mod events;
mod keys;
mod lock;
mod metadata;
mod service;
mod stats;
mod warmup;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use eviction::{EvictionIndex, ScoreClock};
pub use events::{CacheEvent, CleanupReport, EventBus, WarmupReport, EVENT_CHANNEL_CAPACITY};
pub use keys::{KeyCodec, TtlResolver};
pub use lock::LockManager;
pub use metadata::{EntryMetadata, MetadataTracker};
pub use service::CacheService;
pub use stats::{CacheStats, StatsTracker};
pub use warmup::WarmupEntry;
