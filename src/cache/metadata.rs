//! Entry Metadata Module
//!
//! Best-effort diagnostics kept beside each entry: creation time, last
//! access, payload size and an access counter. Nothing here is needed for
//! correctness; the cleaner removes records whose entry has gone.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::KeyCodec;
use crate::error::Result;
use crate::store::StoreClient;

// == Entry Metadata ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub size_bytes: usize,
    /// Entry expiry, None when the entry does not expire
    pub expires_at: Option<DateTime<Utc>>,
    /// Hits since the counter was created; filled in on load
    #[serde(default)]
    pub access_count: u64,
}

impl EntryMetadata {
    fn new(size_bytes: usize, ttl_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_access: now,
            size_bytes,
            expires_at: (ttl_secs > 0).then(|| now + ChronoDuration::seconds(ttl_secs as i64)),
            access_count: 0,
        }
    }

    /// Whole seconds left before the entry expires: Some(0) once expired, None if it never does.
    fn remaining_ttl_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.expires_at.map(|expires| {
            let millis = (expires - now).num_milliseconds().max(0) as u64;
            millis.div_ceil(1000)
        })
    }
}

// == Metadata Tracker ==
#[derive(Clone)]
pub struct MetadataTracker {
    store: StoreClient,
    codec: KeyCodec,
}

impl MetadataTracker {
    pub fn new(store: StoreClient, codec: KeyCodec) -> Self {
        Self { store, codec }
    }

    /// Writes a fresh record alongside a write-through, sharing its TTL.
    ///
    /// The access counter restarts with the new entry.
    pub async fn record_write(&self, key: &str, size_bytes: usize, ttl_secs: u64) -> Result<()> {
        self.store.delete(&[self.codec.hits_key(key)]).await?;

        let record = EntryMetadata::new(size_bytes, ttl_secs);
        self.store
            .set_with_ttl(
                &self.codec.meta_key(key),
                serde_json::to_vec(&record)?,
                ttl_secs,
            )
            .await
    }

    /// Bumps the access counter and last-access time after a hit.
    ///
    /// Does nothing once the record is gone. The counter expires with the entry.
    pub async fn record_access(&self, key: &str) -> Result<()> {
        let meta_key = self.codec.meta_key(key);
        let Some(raw) = self.store.get(&meta_key).await? else {
            return Ok(());
        };
        let mut record: EntryMetadata = serde_json::from_slice(&raw)?;

        let now = Utc::now();
        let ttl_secs = match record.remaining_ttl_secs(now) {
            Some(0) => return Ok(()),
            Some(secs) => secs,
            None => 0,
        };

        let hits_key = self.codec.hits_key(key);
        self.store.increment(&hits_key).await?;
        if ttl_secs > 0 {
            self.store.expire(&hits_key, ttl_secs).await?;
        }

        record.last_access = now;

        self.store
            .set_with_ttl(&meta_key, serde_json::to_vec(&record)?, ttl_secs)
            .await
    }

    /// Loads the record for a key, merged with its access counter.
    pub async fn load(&self, key: &str) -> Result<Option<EntryMetadata>> {
        let Some(raw) = self.store.get(&self.codec.meta_key(key)).await? else {
            return Ok(None);
        };
        let mut record: EntryMetadata = serde_json::from_slice(&raw)?;

        record.access_count = self
            .store
            .get(&self.codec.hits_key(key))
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|text| text.parse().ok())
            .unwrap_or(0);

        Ok(Some(record))
    }

    /// Deletes the records for the given keys.
    pub async fn remove(&self, keys: &[String]) -> Result<u64> {
        let targets: Vec<String> = keys
            .iter()
            .flat_map(|key| [self.codec.meta_key(key), self.codec.hits_key(key)])
            .collect();
        self.store.delete(&targets).await
    }

    /// Entry keys that currently carry a metadata record or access counter.
    pub async fn tracked_entries(&self) -> Result<Vec<String>> {
        let meta_keys = self.store.keys_matching(&self.codec.meta_pattern()).await?;
        let hits_keys = self.store.keys_matching(&self.codec.hits_pattern()).await?;

        let entries: BTreeSet<String> = meta_keys
            .iter()
            .filter_map(|meta_key| self.codec.entry_key_for_meta(meta_key))
            .chain(
                hits_keys
                    .iter()
                    .filter_map(|hits_key| self.codec.entry_key_for_hits(hits_key)),
            )
            .collect();
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::store::MemoryStore;

    fn tracker() -> MetadataTracker {
        let store = StoreClient::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        MetadataTracker::new(store, KeyCodec::new("pos:"))
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let meta = tracker();

        meta.record_write("pos:sales:today", 128, 60).await.unwrap();
        let record = meta.load("pos:sales:today").await.unwrap().unwrap();

        assert_eq!(record.size_bytes, 128);
        assert_eq!(record.access_count, 0);
        assert!(record.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_access_updates_counter() {
        let meta = tracker();

        meta.record_write("pos:sales:today", 16, 60).await.unwrap();
        meta.record_access("pos:sales:today").await.unwrap();
        meta.record_access("pos:sales:today").await.unwrap();

        let record = meta.load("pos:sales:today").await.unwrap().unwrap();
        assert_eq!(record.access_count, 2);
        assert!(record.last_access >= record.created_at);
    }

    #[tokio::test]
    async fn test_rewrite_restarts_counter() {
        let meta = tracker();

        meta.record_write("pos:k", 8, 60).await.unwrap();
        meta.record_access("pos:k").await.unwrap();
        meta.record_write("pos:k", 8, 60).await.unwrap();

        let record = meta.load("pos:k").await.unwrap().unwrap();
        assert_eq!(record.access_count, 0);
    }

    #[tokio::test]
    async fn test_counter_expires_with_entry() {
        let meta = tracker();

        meta.record_write("pos:flash", 8, 1).await.unwrap();
        meta.record_access("pos:flash").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(meta.tracked_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_access_without_record_creates_nothing() {
        let meta = tracker();

        meta.record_access("pos:gone").await.unwrap();
        assert!(meta.tracked_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_drops_record_and_counter() {
        let meta = tracker();

        meta.record_write("pos:a", 1, 0).await.unwrap();
        meta.record_access("pos:a").await.unwrap();

        assert_eq!(meta.remove(&["pos:a".to_string()]).await.unwrap(), 2);
        assert!(meta.load("pos:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tracked_entries() {
        let meta = tracker();

        meta.record_write("pos:a", 1, 60).await.unwrap();
        meta.record_write("pos:b", 1, 60).await.unwrap();
        meta.record_access("pos:b").await.unwrap();

        assert_eq!(
            meta.tracked_entries().await.unwrap(),
            vec!["pos:a".to_string(), "pos:b".to_string()]
        );
    }

    #[test]
    fn test_remaining_ttl() {
        let record = EntryMetadata::new(1, 10);
        let remaining = record.remaining_ttl_secs(Utc::now()).unwrap();
        assert!((9..=10).contains(&remaining));

        assert_eq!(EntryMetadata::new(1, 0).remaining_ttl_secs(Utc::now()), None);
    }
}
