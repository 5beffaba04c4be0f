//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache service against arbitrary keys, values
//! and operation sequences. Async calls are driven with `tokio_test::block_on`.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{CacheService, KeyCodec, TtlResolver};
use crate::config::{Config, EvictionStrategy};
use crate::store::MemoryStore;

// == Test Configuration ==
const TEST_MAX_TRACKED: usize = 10;

fn service(strategy: EvictionStrategy, max_tracked_keys: usize) -> CacheService {
    let config = Config {
        eviction_strategy: strategy,
        max_tracked_keys,
        ..Config::default()
    };
    CacheService::new(&config, Arc::new(MemoryStore::new()))
}

// == Strategies ==
/// Logical keys in the shape POS callers use ("sales:2024:store7")
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(:[a-z0-9]{1,8}){0,3}"
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,128}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so gets and deletes actually hit
    let key = "[a-d]";
    prop_oneof![
        (key, valid_value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Counters reflect exactly the reads that happened.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache = service(EvictionStrategy::Lru, 100);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;
        let mut expected_writes: u64 = 0;

        tokio_test::block_on(async {
            for op in ops {
                match op {
                    CacheOp::Set { key, value } => {
                        if cache.set(&key, &value, None).await {
                            expected_writes += 1;
                        }
                    }
                    CacheOp::Get { key } => match cache.get::<String>(&key).await {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    },
                    CacheOp::Delete { key } => {
                        cache.delete(&key).await;
                    }
                }
            }
        });

        let stats = cache.get_stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.writes, expected_writes, "Writes mismatch");
        prop_assert_eq!(stats.errors, 0, "Unexpected errors");
    }

    // A stored value reads back unchanged.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let cache = service(EvictionStrategy::Lru, 100);

        let retrieved = tokio_test::block_on(async {
            cache.set(&key, &value, None).await;
            cache.get::<String>(&key).await
        });

        prop_assert_eq!(retrieved, Some(value), "Round-trip value mismatch");
    }

    // Structured values survive the JSON encoding too.
    #[test]
    fn prop_roundtrip_structured(
        key in valid_key_strategy(),
        totals in prop::collection::vec(any::<i64>(), 0..32)
    ) {
        let cache = service(EvictionStrategy::Lru, 100);

        let retrieved = tokio_test::block_on(async {
            cache.set(&key, &totals, None).await;
            cache.get::<Vec<i64>>(&key).await
        });

        prop_assert_eq!(retrieved, Some(totals));
    }

    // Namespacing an already namespaced key changes nothing.
    #[test]
    fn prop_build_key_idempotent(namespace in "[a-z]{1,6}:", key in valid_key_strategy()) {
        prop_assume!(!key.starts_with(&namespace));
        let codec = KeyCodec::new(namespace.clone());

        let once = codec.build_key(&key);
        prop_assert!(once.starts_with(&namespace));
        prop_assert_eq!(codec.build_key(&once), once.clone());
        prop_assert_eq!(codec.logical_key(&once), key.as_str());
    }

    // The longest matching override prefix decides the TTL.
    #[test]
    fn prop_ttl_longest_prefix(
        base in "[a-z]{1,6}:",
        suffix in "[a-z]{1,6}:",
        rest in "[a-z0-9]{0,8}",
        short_ttl in 1u64..1000,
        long_ttl in 1u64..1000
    ) {
        let long_prefix = format!("{}{}", base, suffix);
        let resolver = TtlResolver::new(
            300,
            vec![(base.clone(), short_ttl), (long_prefix.clone(), long_ttl)],
        );

        prop_assert_eq!(resolver.resolve(&format!("{}{}", long_prefix, rest), None), long_ttl);
        prop_assert_eq!(resolver.resolve(&format!("{}{}", long_prefix, rest), Some(7)), 7);
        prop_assert_eq!(resolver.resolve(&format!("zz{}", rest), None), 300);
    }

    // The eviction index never settles above its bound.
    #[test]
    fn prop_index_bound_enforced(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..60)
    ) {
        let cache = service(EvictionStrategy::Lru, TEST_MAX_TRACKED);
        let unique: HashSet<String> = keys.iter().map(|k| cache.codec().build_key(k)).collect();
        // "pos:x" and "x" name the same entry
        prop_assume!(unique.len() == keys.len());

        let (tracked, evictions) = tokio_test::block_on(async {
            for key in &keys {
                cache.set(key, &1u8, None).await;
            }
            (cache.index().len().await.unwrap(), cache.get_stats().evictions)
        });

        prop_assert_eq!(tracked, unique.len().min(TEST_MAX_TRACKED));
        prop_assert_eq!(evictions as usize, unique.len().saturating_sub(TEST_MAX_TRACKED));
    }
}
