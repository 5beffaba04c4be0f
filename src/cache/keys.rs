//! Key Codec Module
//!
//! Builds namespaced store keys and resolves per-key TTLs.
//!
//! Logical keys starting with `__` are reserved: locks, metadata, counters
//! and eviction indexes live there, out of reach of pattern invalidation.

use crate::config::EvictionStrategy;

const INTERNAL_MARKER: &str = "__";
const LOCK_SEGMENT: &str = "__lock:";
const META_SEGMENT: &str = "__meta:";
const HITS_SEGMENT: &str = "__hits:";
const INDEX_SEGMENT: &str = "__index:";

// == Key Codec ==
/// Maps logical keys into the namespace shared with other services.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    namespace: String,
}

impl KeyCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prepends the namespace unless it is already there.
    pub fn build_key(&self, key: &str) -> String {
        if key.starts_with(&self.namespace) {
            key.to_string()
        } else {
            format!("{}{}", self.namespace, key)
        }
    }

    /// Strips the namespace, leaving foreign keys untouched.
    pub fn logical_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.namespace.as_str()).unwrap_or(key)
    }

    /// Builds a glob pattern over this namespace; glob syntax in the
    /// namespace itself is escaped.
    pub fn build_pattern(&self, pattern: &str) -> String {
        let pattern = self.logical_key(pattern);
        format!("{}{}", escape_glob(&self.namespace), pattern)
    }

    /// True for keys the layer manages for itself.
    pub fn is_internal(&self, key: &str) -> bool {
        self.logical_key(key).starts_with(INTERNAL_MARKER)
    }

    pub fn lock_key(&self, key: &str) -> String {
        self.internal_key(LOCK_SEGMENT, key)
    }

    pub fn meta_key(&self, key: &str) -> String {
        self.internal_key(META_SEGMENT, key)
    }

    pub fn hits_key(&self, key: &str) -> String {
        self.internal_key(HITS_SEGMENT, key)
    }

    pub fn index_key(&self, strategy: EvictionStrategy) -> String {
        format!("{}{}{}", self.namespace, INDEX_SEGMENT, strategy.as_str())
    }

    /// Glob pattern over every metadata record in the namespace.
    pub fn meta_pattern(&self) -> String {
        format!("{}{}*", escape_glob(&self.namespace), META_SEGMENT)
    }

    /// Glob pattern over every access counter in the namespace.
    pub fn hits_pattern(&self) -> String {
        format!("{}{}*", escape_glob(&self.namespace), HITS_SEGMENT)
    }

    /// Recovers the entry key a metadata key describes.
    pub fn entry_key_for_meta(&self, meta_key: &str) -> Option<String> {
        self.owning_entry(META_SEGMENT, meta_key)
    }

    /// Recovers the entry key an access counter belongs to.
    pub fn entry_key_for_hits(&self, hits_key: &str) -> Option<String> {
        self.owning_entry(HITS_SEGMENT, hits_key)
    }

    fn owning_entry(&self, segment: &str, internal_key: &str) -> Option<String> {
        let logical = self.logical_key(internal_key).strip_prefix(segment)?;
        Some(self.build_key(logical))
    }

    fn internal_key(&self, segment: &str, key: &str) -> String {
        format!("{}{}{}", self.namespace, segment, self.logical_key(key))
    }
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// == TTL Resolver ==
/// Chooses a TTL by longest matching key prefix.
#[derive(Debug, Clone)]
pub struct TtlResolver {
    default_ttl: u64,
    overrides: Vec<(String, u64)>,
}

impl TtlResolver {
    pub fn new(default_ttl: u64, overrides: Vec<(String, u64)>) -> Self {
        Self {
            default_ttl,
            overrides,
        }
    }

    /// An explicit TTL wins; otherwise the longest matching prefix; otherwise the default.
    pub fn resolve(&self, key: &str, explicit: Option<u64>) -> u64 {
        if let Some(ttl) = explicit {
            return ttl;
        }

        self.overrides
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.default_ttl)
    }
}
