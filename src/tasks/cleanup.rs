//! Stale Record Cleanup Task
//!
//! Background task that periodically drops metadata and eviction-index
//! records whose cache entries have expired in the store.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheService;

/// Spawns a background task that sweeps stale tracking records.
///
/// Entry expiry is the store's job; this only keeps the bookkeeping around
/// entries from outliving them. The returned handle is aborted on shutdown.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: CacheService, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let report = cache.sweep_stale().await;

            if report.removed > 0 {
                info!(
                    "Cache cleanup: removed {} stale records of {} scanned",
                    report.removed, report.scanned
                );
            } else {
                debug!("Cache cleanup: {} records scanned, none stale", report.scanned);
            }
        }
    })
}
