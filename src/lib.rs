//! POS Cache - cache coordination layer for POS analytics services
//!
//! Namespaced, TTL-aware caching over a shared key-value store with
//! stampede protection, bounded eviction tracking and hit/miss statistics.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheService, WarmupEntry};
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::{BackingStore, MemoryStore};
pub use tasks::spawn_cleanup_task;
