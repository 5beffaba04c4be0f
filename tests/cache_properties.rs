//! Integration Tests for Cache Behavior
//!
//! Exercises the cache service end to end against the in-process store,
//! plus a store that refuses every call to check fail-open behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pos_cache::config::EvictionStrategy;
use pos_cache::store::ZAddMode;
use pos_cache::{BackingStore, CacheError, CacheService, Config, MemoryStore, Result};
use serde::{Deserialize, Serialize};

// == Helper Functions ==

fn cache_with(config: Config) -> CacheService {
    CacheService::new(&config, Arc::new(MemoryStore::new()))
}

fn cache() -> CacheService {
    cache_with(Config::default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DailySales {
    store_id: u32,
    total_cents: i64,
    top_items: Vec<String>,
}

/// A store whose every call fails as if the network were down.
struct UnreachableStore;

fn refused<T>() -> Result<T> {
    Err(CacheError::StoreUnavailable("connection refused".to_string()))
}

#[async_trait]
impl BackingStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        refused()
    }

    async fn set_with_ttl(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> Result<()> {
        refused()
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64> {
        refused()
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        refused()
    }

    async fn keys_matching(&self, _pattern: &str) -> Result<Vec<String>> {
        refused()
    }

    async fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&[u8]>,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<bool> {
        refused()
    }

    async fn compare_and_delete(&self, _key: &str, _expected: &[u8]) -> Result<bool> {
        refused()
    }

    async fn increment(&self, _key: &str) -> Result<i64> {
        refused()
    }

    async fn expire(&self, _key: &str, _ttl_secs: u64) -> Result<bool> {
        refused()
    }

    async fn zadd(&self, _key: &str, _member: &str, _score: f64, _mode: ZAddMode) -> Result<bool> {
        refused()
    }

    async fn zincr(&self, _key: &str, _member: &str, _delta: f64) -> Result<f64> {
        refused()
    }

    async fn zcard(&self, _key: &str) -> Result<usize> {
        refused()
    }

    async fn zpop_min(&self, _key: &str, _count: usize) -> Result<Vec<String>> {
        refused()
    }

    async fn zrem(&self, _key: &str, _members: &[String]) -> Result<u64> {
        refused()
    }

    async fn zmembers(&self, _key: &str) -> Result<Vec<String>> {
        refused()
    }
}

// == Round Trip ==

#[tokio::test]
async fn test_round_trip_structured_value() {
    let cache = cache();
    let sales = DailySales {
        store_id: 7,
        total_cents: 1_234_500,
        top_items: vec!["espresso".to_string(), "croissant".to_string()],
    };

    assert!(cache.set("sales:2024-06-01:store7", &sales, None).await);
    assert_eq!(cache.get("sales:2024-06-01:store7").await, Some(sales));
}

// == Expiry ==

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let cache = cache();

    cache.set("dashboard:live", &42, Some(1)).await;
    assert_eq!(cache.get::<i32>("dashboard:live").await, Some(42));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(cache.get::<i32>("dashboard:live").await, None);
}

#[tokio::test]
async fn test_prefix_ttl_applies_without_explicit_ttl() {
    let config = Config {
        ttl_overrides: vec![("flash:".to_string(), 1)],
        ..Config::default()
    };
    let cache = cache_with(config);

    cache.set("flash:sale", &"50% off", None).await;
    cache.set("regular:sale", &"5% off", None).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(cache.get::<String>("flash:sale").await, None);
    assert!(cache.get::<String>("regular:sale").await.is_some());
}

// == Single Flight ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_get_with_lock_runs_generator_once() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_with_lock(
                    "analytics:weekly",
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(9_876_u64)
                    },
                    None,
                    None,
                )
                .await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Ok(value) => assert_eq!(value, 9_876),
            Err(CacheError::LockContentionExhausted { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cache.locks().is_locked("analytics:weekly").await.unwrap());
}

#[tokio::test]
async fn test_get_with_lock_hit_skips_generator() {
    let cache = cache();
    cache.set("forecast:q3", &"steady", None).await;

    let value: String = cache
        .get_with_lock(
            "forecast:q3",
            || async { Err(anyhow::anyhow!("generator must not run on a hit")) },
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(value, "steady");
}

// == Lock Ownership ==

#[tokio::test]
async fn test_lock_ownership() {
    let cache = cache();
    let locks = cache.locks();
    let ttl = Duration::from_secs(10);

    assert!(locks.acquire("k", "token-a", ttl).await.unwrap());
    assert!(!locks.acquire("k", "token-b", ttl).await.unwrap());
    assert!(!locks.release("k", "token-b").await.unwrap());
    assert!(locks.is_locked("k").await.unwrap());
    assert!(locks.release("k", "token-a").await.unwrap());
    assert!(locks.acquire("k", "token-c", ttl).await.unwrap());
}

// == Eviction Bound ==

#[tokio::test]
async fn test_lru_bound_keeps_most_recent() {
    let config = Config {
        eviction_strategy: EvictionStrategy::Lru,
        max_tracked_keys: 100,
        ..Config::default()
    };
    let cache = cache_with(config);

    for i in 0..150 {
        cache.set(&format!("product:{}", i), &i, None).await;
    }

    for i in 0..50 {
        assert_eq!(cache.get::<i32>(&format!("product:{}", i)).await, None);
    }
    for i in 50..150 {
        assert_eq!(cache.get::<i32>(&format!("product:{}", i)).await, Some(i));
    }

    let stats = cache.get_stats();
    assert_eq!(stats.evictions, 50);
    assert_eq!(cache.index().len().await.unwrap(), 100);
}

#[tokio::test]
async fn test_lru_bound_keeps_recently_read_keys() {
    let config = Config {
        eviction_strategy: EvictionStrategy::Lru,
        max_tracked_keys: 100,
        ..Config::default()
    };
    let cache = cache_with(config);

    for i in 0..100 {
        cache.set(&format!("product:{}", i), &i, None).await;
    }
    for i in 0..50 {
        assert_eq!(cache.get::<i32>(&format!("product:{}", i)).await, Some(i));
    }
    for i in 100..150 {
        cache.set(&format!("product:{}", i), &i, None).await;
    }

    for i in (0..50).chain(100..150) {
        assert!(cache.contains(&format!("product:{}", i)).await.unwrap());
    }
    for i in 50..100 {
        assert!(!cache.contains(&format!("product:{}", i)).await.unwrap());
    }
    assert_eq!(cache.get_stats().evictions, 50);
}

#[tokio::test]
async fn test_lfu_bound_keeps_frequently_read_keys() {
    let config = Config {
        eviction_strategy: EvictionStrategy::Lfu,
        max_tracked_keys: 3,
        ..Config::default()
    };
    let cache = cache_with(config);

    cache.set("menu:coffee", &1, None).await;
    cache.set("menu:tea", &2, None).await;
    cache.set("menu:cake", &3, None).await;
    for _ in 0..3 {
        cache.get::<i32>("menu:coffee").await;
        cache.get::<i32>("menu:cake").await;
    }
    cache.set("menu:soup", &4, None).await;

    assert!(cache.contains("menu:coffee").await.unwrap());
    assert!(cache.contains("menu:cake").await.unwrap());
    assert_eq!(cache.get_stats().evictions, 1);
}

#[tokio::test]
async fn test_fifo_bound_ignores_reads() {
    let config = Config {
        eviction_strategy: EvictionStrategy::Fifo,
        max_tracked_keys: 2,
        ..Config::default()
    };
    let cache = cache_with(config);

    cache.set("first", &1, None).await;
    cache.set("second", &2, None).await;
    cache.get::<i32>("first").await;
    cache.set("third", &3, None).await;

    assert_eq!(cache.get::<i32>("first").await, None);
    assert_eq!(cache.get::<i32>("second").await, Some(2));
}

#[tokio::test]
async fn test_no_eviction_strategy_keeps_everything() {
    let config = Config {
        eviction_strategy: EvictionStrategy::None,
        max_tracked_keys: 1,
        ..Config::default()
    };
    let cache = cache_with(config);

    for i in 0..5 {
        cache.set(&format!("k{}", i), &i, None).await;
    }

    for i in 0..5 {
        assert_eq!(cache.get::<i32>(&format!("k{}", i)).await, Some(i));
    }
    assert_eq!(cache.get_stats().evictions, 0);
}

// == Pattern Invalidation ==

#[tokio::test]
async fn test_invalidate_pattern() {
    let cache = cache();

    cache.set("a:1", &1, None).await;
    cache.set("a:2", &2, None).await;
    cache.set("b:1", &3, None).await;

    assert_eq!(cache.invalidate_pattern("a:*").await, 2);
    assert_eq!(cache.get::<i32>("a:1").await, None);
    assert_eq!(cache.get::<i32>("a:2").await, None);
    assert_eq!(cache.get::<i32>("b:1").await, Some(3));
    assert_eq!(cache.index().tracked().await.unwrap(), vec!["pos:b:1"]);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store: Arc<dyn BackingStore> = Arc::new(MemoryStore::new());
    let pos = CacheService::new(&Config::default(), store.clone());
    let inventory = CacheService::new(
        &Config {
            namespace: "inv:".to_string(),
            ..Config::default()
        },
        store,
    );

    pos.set("stock:1", &10, None).await;
    inventory.set("stock:1", &99, None).await;

    assert_eq!(pos.invalidate_pattern("*").await, 1);
    assert_eq!(inventory.get::<i32>("stock:1").await, Some(99));
}

// == Fail Open ==

#[tokio::test]
async fn test_unreachable_store_fails_open() {
    let cache = CacheService::new(&Config::default(), Arc::new(UnreachableStore));

    assert_eq!(cache.get::<i32>("sales:today").await, None);
    assert!(!cache.set("sales:today", &1, None).await);
    assert!(!cache.delete("sales:today").await);
    assert_eq!(cache.invalidate_pattern("sales:*").await, 0);

    let value: i32 = cache
        .get_or_set("sales:today", || async { Ok(17) }, None)
        .await
        .unwrap();
    assert_eq!(value, 17);

    let value: i32 = cache
        .get_with_lock("sales:today", || async { Ok(18) }, None, None)
        .await
        .unwrap();
    assert_eq!(value, 18);

    let stats = cache.get_stats();
    assert!(stats.errors >= 6);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn test_generator_failure_is_not_cached() {
    let cache = cache();
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    for _ in 0..2 {
        let result: pos_cache::Result<i32> = cache
            .get_or_set(
                "report:broken",
                || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("warehouse timeout"))
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(CacheError::Generator(_))));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// == Stats ==

#[tokio::test]
async fn test_hit_rate_matches_reads() {
    let cache = cache();
    assert_eq!(cache.get_stats().hit_rate, 0.0);

    cache.set("x", &1, None).await;
    for _ in 0..3 {
        cache.get::<i32>("x").await;
    }
    cache.get::<i32>("y").await;

    let stats = cache.get_stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.75);
}
