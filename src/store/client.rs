//! Store Client Module
//!
//! Bounds every backing store round trip so a lost connection surfaces as
//! `StoreUnavailable` instead of a hung caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{BackingStore, ZAddMode};
use crate::error::{CacheError, Result};

// == Store Client ==
/// Cheaply cloneable handle to the shared backing store.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn BackingStore>,
    timeout: Duration,
}

impl StoreClient {
    pub fn new(inner: Arc<dyn BackingStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::StoreUnavailable(format!(
                "{} timed out after {}ms",
                op,
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.bounded("get", self.inner.get(key)).await
    }

    pub async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        self.bounded("set", self.inner.set_with_ttl(key, value, ttl_secs))
            .await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.bounded("delete", self.inner.delete(keys)).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.bounded("exists", self.inner.exists(key)).await
    }

    pub async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        self.bounded("keys", self.inner.keys_matching(pattern)).await
    }

    pub async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool> {
        self.bounded(
            "compare_and_set",
            self.inner.compare_and_set(key, expected, value, ttl),
        )
        .await
    }

    pub async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        self.bounded(
            "compare_and_delete",
            self.inner.compare_and_delete(key, expected),
        )
        .await
    }

    pub async fn increment(&self, key: &str) -> Result<i64> {
        self.bounded("increment", self.inner.increment(key)).await
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        self.bounded("expire", self.inner.expire(key, ttl_secs))
            .await
    }

    pub async fn zadd(&self, key: &str, member: &str, score: f64, mode: ZAddMode) -> Result<bool> {
        self.bounded("zadd", self.inner.zadd(key, member, score, mode))
            .await
    }

    pub async fn zincr(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.bounded("zincr", self.inner.zincr(key, member, delta))
            .await
    }

    pub async fn zcard(&self, key: &str) -> Result<usize> {
        self.bounded("zcard", self.inner.zcard(key)).await
    }

    pub async fn zpop_min(&self, key: &str, count: usize) -> Result<Vec<String>> {
        self.bounded("zpop_min", self.inner.zpop_min(key, count))
            .await
    }

    pub async fn zrem(&self, key: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.bounded("zrem", self.inner.zrem(key, members)).await
    }

    pub async fn zmembers(&self, key: &str) -> Result<Vec<String>> {
        self.bounded("zmembers", self.inner.zmembers(key)).await
    }
}
