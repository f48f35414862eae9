use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::expand::Expansion;
use crate::value::Value;

/// Content hash of one (template, arguments, identifier prefix) triple.
pub type CacheKey = [u8; 32];

/// Computes the cache key for an expansion request. Equal inputs always
/// hash equal; the argument serialization is shape-tagged so `Int(1)` and
/// `Str("1")` cannot collide.
pub fn expansion_key(template: &str, args: &[Value], ident_prefix: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update((template.len() as u64).to_le_bytes());
    hasher.update(template.as_bytes());
    hasher.update((args.len() as u64).to_le_bytes());
    let mut buf = Vec::new();
    for arg in args {
        arg.hash_bytes(&mut buf);
    }
    hasher.update(&buf);
    hasher.update(ident_prefix.as_bytes());
    hasher.finalize().into()
}

/// Bounded LRU memo for placeholder expansions.
///
/// Expanding is pure, so a stale or missing entry only costs a recompute;
/// the mutex keeps per-key writes atomic under concurrent use. The facade
/// consults the cache only when a query logger is attached, because that is
/// the one path that expands the same input twice (once for the log line,
/// once for execution).
pub struct ExpandCache {
    capacity: usize,
    entries: Mutex<IndexMap<CacheKey, Expansion>>,
}

impl ExpandCache {
    pub const DEFAULT_CAPACITY: usize = 512;

    /// Creates a cache holding at most `capacity` expansions; the least
    /// recently used entry is evicted first.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Expansion> {
        let mut entries = self.lock();
        // Re-inserting moves the entry to the back, which is the MRU slot.
        let (key, hit) = entries.shift_remove_entry(key)?;
        entries.insert(key, hit.clone());
        Some(hit)
    }

    pub fn insert(&self, key: CacheKey, expansion: Expansion) {
        let mut entries = self.lock();
        entries.shift_remove(&key);
        if entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::trace!(key = %hex::encode(&evicted[..8]), "evicting cached expansion");
            }
        }
        entries.insert(key, expansion);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops all cached expansions.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<CacheKey, Expansion>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExpandCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Process-wide cache shared by facades that are not given their own.
pub fn default_cache() -> &'static ExpandCache {
    static CACHE: Lazy<ExpandCache> = Lazy::new(ExpandCache::default);
    &CACHE
}
