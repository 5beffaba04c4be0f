//! Cache Warmup Module
//!
//! Pre-populates entries at startup so the first requests after a deploy
//! do not all miss at once.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheEvent, CacheService, WarmupReport};

type Generator = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send>;

// == Warmup Entry ==
/// A key to pre-populate and the generator that produces its value.
pub struct WarmupEntry {
    key: String,
    ttl: Option<u64>,
    generator: Generator,
}

impl WarmupEntry {
    pub fn new<T, F, Fut>(key: impl Into<String>, ttl: Option<u64>, generator: F) -> Self
    where
        T: Serialize + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            key: key.into(),
            ttl,
            generator: Box::new(move || {
                async move {
                    let value = generator().await?;
                    Ok(serde_json::to_value(value)?)
                }
                .boxed()
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for WarmupEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmupEntry")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CacheService {
    // == Warmup ==
    /// Generates and writes every entry that is not already cached.
    ///
    /// Entries are processed one by one; a failing generator or write is
    /// counted and logged but never stops the rest.
    pub async fn warmup(&self, entries: Vec<WarmupEntry>) -> WarmupReport {
        let mut report = WarmupReport::default();

        for entry in entries {
            match self.contains(&entry.key).await {
                Ok(true) => {
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Warmup of '{}' skipped, store unavailable: {}", entry.key, e);
                    self.record_error();
                    report.failed += 1;
                    continue;
                }
            }

            let value = match (entry.generator)().await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Warmup generator for '{}' failed: {:#}", entry.key, e);
                    report.failed += 1;
                    continue;
                }
            };

            // Nothing to cache for a null result
            if value.is_null() {
                report.skipped += 1;
                continue;
            }

            match self.try_set(&entry.key, &value, entry.ttl).await {
                Ok(()) => report.success += 1,
                Err(e) => {
                    warn!("Warmup write for '{}' failed: {}", entry.key, e);
                    self.record_error();
                    report.failed += 1;
                }
            }
        }

        info!(
            "Cache warmup finished: {} written, {} failed, {} skipped",
            report.success, report.failed, report.skipped
        );
        self.publish(CacheEvent::WarmupCompleted(report.clone()));
        report
    }
}
