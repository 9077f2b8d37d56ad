//! Bounded in-process caches.
//!
//! [`LruCache`] evicts the least recently used tenth of its entries when
//! full. Every cache implements [`EvictableCache`] so cleanup strategies
//! can flush it under memory pressure without knowing its key or value
//! types.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;

/// Type-erased view of a cache used by cleanup strategies.
pub trait EvictableCache: Send + Sync {
    /// Name used in logs and cleanup results.
    fn cache_name(&self) -> &str;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rough memory held by the entries.
    fn estimated_bytes(&self) -> u64;

    /// Drops every entry and returns the estimated bytes released.
    fn evict_all(&self) -> u64;
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries evicted.
    pub evictions: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    bytes: usize,
    /// Access counter for LRU eviction.
    last_access: u64,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    access_counter: u64,
    stats: CacheStats,
}

/// Thread-safe LRU cache.
///
/// # Examples
///
/// ```
/// use codesplit::cache::{EvictableCache, LruCache};
///
/// let cache: LruCache<String, usize> = LruCache::new("lengths", 10);
/// cache.insert("a".to_string(), 1);
/// assert_eq!(cache.get(&"a".to_string()), Some(1));
/// assert_eq!(cache.len(), 1);
/// cache.evict_all();
/// assert!(cache.is_empty());
/// ```
#[derive(Debug)]
pub struct LruCache<K, V> {
    name: String,
    max_entries: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `max_entries` entries.
    #[must_use]
    pub fn new(name: impl Into<String>, max_entries: usize) -> Self {
        Self {
            name: name.into(),
            max_entries: max_entries.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                access_counter: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Returns a clone of the cached value, marking it as recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.access_counter += 1;
        let access = inner.access_counter;
        let found = inner.entries.get_mut(key).map(|entry| {
            entry.last_access = access;
            entry.value.clone()
        });
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    /// Inserts a value, estimating its size from the value type.
    pub fn insert(&self, key: K, value: V) {
        self.insert_sized(key, value, std::mem::size_of::<V>());
    }

    /// Inserts a value with an explicit size estimate in bytes.
    pub fn insert_sized(&self, key: K, value: V, bytes: usize) {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            Self::evict_oldest(&mut inner, self.max_entries);
        }
        inner.access_counter += 1;
        let last_access = inner.access_counter;
        inner.entries.insert(
            key,
            Entry {
                value,
                bytes,
                last_access,
            },
        );
    }

    /// Removes a single entry.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.remove(key).map(|entry| entry.value)
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_entries
    }

    // Drops the oldest 10%.
    fn evict_oldest(inner: &mut Inner<K, V>, max_entries: usize) {
        let evict_count = (max_entries / 10).max(1);
        let mut by_age: Vec<(K, u64)> = inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_access))
            .collect();
        by_age.sort_by_key(|(_, access)| *access);
        for (key, _) in by_age.into_iter().take(evict_count) {
            inner.entries.remove(&key);
            inner.stats.evictions += 1;
        }
    }
}

impl<K, V> EvictableCache for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn cache_name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    fn estimated_bytes(&self) -> u64 {
        self.inner
            .lock()
            .entries
            .values()
            .map(|e| e.bytes as u64)
            .sum()
    }

    fn evict_all(&self) -> u64 {
        let mut inner = self.inner.lock();
        let freed: u64 = inner.entries.values().map(|e| e.bytes as u64).sum();
        let count = inner.entries.len() as u64;
        inner.entries.clear();
        inner.stats.evictions += count;
        freed
    }
}
