//! Cache Event Module
//!
//! Notifications for bulk cache changes, delivered over a broadcast channel
//! that interested components subscribe to explicitly.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of undelivered events kept per subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// == Reports ==
/// Outcome of a warmup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    /// Entries generated and written
    pub success: usize,
    /// Entries whose generator or write failed
    pub failed: usize,
    /// Entries already present
    pub skipped: usize,
}

/// Outcome of a cleaner sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Tracked keys inspected
    pub scanned: usize,
    /// Stale tracking records removed
    pub removed: usize,
}

// == Cache Event ==
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// Entries removed to respect the tracked-key bound
    Evicted { keys: Vec<String> },
    /// Pattern invalidation finished
    Invalidated { pattern: String, removed: u64 },
    /// Warmup pass finished
    WarmupCompleted(WarmupReport),
    /// Cleaner sweep finished
    CleanupCompleted(CleanupReport),
}

// == Event Bus ==
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Sends to current subscribers; an event with no audience is dropped.
    pub fn publish(&self, event: CacheEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!("No cache event subscribers, dropped {:?}", event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}
