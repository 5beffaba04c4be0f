//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use serde::Serialize;

// == Eviction Strategy ==
/// Eviction policy applied to the tracked-key index.
///
/// Chosen once at construction and fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently used: score is the wall-clock time of the last access
    Lru,
    /// Least frequently used: score is a per-key access counter
    Lfu,
    /// First in, first out: score is the wall-clock time of the first write
    Fifo,
    /// No index is maintained; TTL expiry is the only bound
    None,
}

impl EvictionStrategy {
    /// Short lowercase name, also used in the index key.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Fifo => "fifo",
            EvictionStrategy::None => "none",
        }
    }
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            "fifo" => Ok(EvictionStrategy::Fifo),
            "none" | "ttl" => Ok(EvictionStrategy::None),
            other => Err(format!("unknown eviction strategy '{}'", other)),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix prepended to every logical key
    pub namespace: String,
    /// Default TTL in seconds for keys without an override
    pub default_ttl: u64,
    /// `(prefix, ttl_seconds)` pairs, longest matching prefix wins
    pub ttl_overrides: Vec<(String, u64)>,
    /// Eviction policy for the tracked-key index
    pub eviction_strategy: EvictionStrategy,
    /// Maximum number of keys tracked by the eviction index
    pub max_tracked_keys: usize,
    /// Maximum serialized entry size in bytes
    pub max_entry_bytes: usize,
    /// Lock expiry in milliseconds for `get_with_lock`
    pub lock_timeout_ms: u64,
    /// Delays between re-checks while another holder owns the lock
    pub lock_wait_schedule_ms: Vec<u64>,
    /// Upper bound on a single backing store round trip
    pub store_timeout_ms: u64,
    /// Cleaner interval in seconds
    pub cleanup_interval: u64,
    /// Admin HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Key prefix (default: `pos:`)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `TTL_OVERRIDES` - `prefix=secs` pairs separated by commas
    /// - `EVICTION_STRATEGY` - `lru`, `lfu`, `fifo` or `none` (default: lru)
    /// - `MAX_TRACKED_KEYS` - Eviction index bound (default: 10000)
    /// - `MAX_ENTRY_BYTES` - Entry size limit (default: 10 MiB)
    /// - `LOCK_TIMEOUT_MS` - Lock expiry (default: 10000)
    /// - `LOCK_WAIT_SCHEDULE_MS` - Comma separated waits (default: 100,500)
    /// - `STORE_TIMEOUT_MS` - Store round-trip bound (default: 2000)
    /// - `CLEANUP_INTERVAL` - Cleaner frequency in seconds (default: 60)
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    pub fn from_env() -> Self {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            namespace: lookup("CACHE_NAMESPACE")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            default_ttl: parse_var(&lookup, "DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            ttl_overrides: lookup("TTL_OVERRIDES")
                .map(|v| parse_ttl_overrides(&v))
                .unwrap_or(defaults.ttl_overrides),
            eviction_strategy: lookup("EVICTION_STRATEGY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.eviction_strategy),
            max_tracked_keys: parse_var(&lookup, "MAX_TRACKED_KEYS")
                .unwrap_or(defaults.max_tracked_keys),
            max_entry_bytes: parse_var(&lookup, "MAX_ENTRY_BYTES")
                .unwrap_or(defaults.max_entry_bytes),
            lock_timeout_ms: parse_var(&lookup, "LOCK_TIMEOUT_MS")
                .unwrap_or(defaults.lock_timeout_ms),
            lock_wait_schedule_ms: lookup("LOCK_WAIT_SCHEDULE_MS")
                .and_then(|v| parse_schedule(&v))
                .unwrap_or(defaults.lock_wait_schedule_ms),
            store_timeout_ms: parse_var(&lookup, "STORE_TIMEOUT_MS")
                .unwrap_or(defaults.store_timeout_ms),
            cleanup_interval: parse_var(&lookup, "CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
            server_port: parse_var(&lookup, "SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "pos:".to_string(),
            default_ttl: 300,
            ttl_overrides: vec![
                ("dashboard:".to_string(), 60),
                ("analytics:".to_string(), 600),
                ("forecast:".to_string(), 3600),
            ],
            eviction_strategy: EvictionStrategy::Lru,
            max_tracked_keys: 10_000,
            max_entry_bytes: 10 * 1024 * 1024,
            lock_timeout_ms: 10_000,
            lock_wait_schedule_ms: vec![100, 500],
            store_timeout_ms: 2_000,
            cleanup_interval: 60,
            server_port: 3000,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

/// Parses `prefix=secs,prefix=secs`, skipping malformed pairs.
fn parse_ttl_overrides(raw: &str) -> Vec<(String, u64)> {
    raw.split(',')
        .filter_map(|pair| {
            let (prefix, secs) = pair.rsplit_once('=')?;
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return None;
            }
            Some((prefix.to_string(), secs.trim().parse().ok()?))
        })
        .collect()
}

/// Parses `100,500`; any bad element rejects the whole schedule.
fn parse_schedule(raw: &str) -> Option<Vec<u64>> {
    raw.split(',')
        .map(|step| step.trim().parse().ok())
        .collect()
}
