//! Keyed store of shared tiles.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use quick_cache::unsync::Cache;
use quick_cache::{DefaultHashBuilder, Lifecycle, Weighter};

/// Keyed store of `Arc<T>` with insert-if-absent semantics.
///
/// By default the cache is unbounded: entries stay until [`TileCache::clear`] is called. A cache
/// created with [`TileCache::with_capacity`] keeps at most about `capacity` entries strongly and
/// evicts the rest. Evicted entries that are still used elsewhere are remembered through weak
/// references, so for one key the cache never hands out two different instances while the first
/// one is alive.
pub struct TileCache<K, T> {
    inner: Mutex<CacheInner<K, T>>,
}

enum CacheInner<K, T> {
    Unbounded(HashMap<K, Arc<T>, ahash::RandomState>),
    Bounded(BoundedCache<K, T>),
}

struct BoundedCache<K, T> {
    capacity: usize,
    strong: Cache<K, Arc<T>, UnitWeighter, DefaultHashBuilder, EvictionLc>,
    weak: HashMap<K, Weak<T>, ahash::RandomState>,
}

struct UnitWeighter;

impl<K, T> Weighter<K, Arc<T>> for UnitWeighter {
    fn weight(&self, _key: &K, _val: &Arc<T>) -> u32 {
        1
    }
}

struct EvictionLc;

impl<K, T> Lifecycle<K, Arc<T>> for EvictionLc {
    type RequestState = Vec<K>;

    fn begin_request(&self) -> Self::RequestState {
        Vec::new()
    }

    fn on_evict(&self, state: &mut Self::RequestState, key: K, _val: Arc<T>) {
        state.push(key);
    }
}

impl<K: Eq + Hash + Clone, T> BoundedCache<K, T> {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            strong: Cache::with(
                capacity,
                capacity as u64,
                UnitWeighter,
                DefaultHashBuilder::default(),
                EvictionLc,
            ),
            weak: HashMap::default(),
        }
    }

    fn get(&mut self, key: &K) -> Option<Arc<T>> {
        if let Some(value) = self.strong.get(key) {
            return Some(value.clone());
        }

        let Some(value) = self.weak.get(key)?.upgrade() else {
            self.weak.remove(key);
            return None;
        };

        log::trace!("Re-adopting evicted cache entry that is still in use");
        self.insert(key.clone(), value.clone());
        Some(value)
    }

    fn insert(&mut self, key: K, value: Arc<T>) {
        self.weak.insert(key.clone(), Arc::downgrade(&value));
        let evicted = self.strong.insert_with_lifecycle(key, value);
        for key in evicted {
            self.on_evicted(key);
        }

        // Entries evicted while in use are dropped later, so dead references pile up here.
        if self.weak.len() > 2 * self.capacity {
            self.prune();
        }
    }

    fn on_evicted(&mut self, key: K) {
        let Some(value_ref) = self.weak.get(&key) else {
            return;
        };

        if value_ref.strong_count() == 0 {
            self.weak.remove(&key);
        }
    }

    fn prune(&mut self) {
        self.weak.retain(|_, value| value.strong_count() > 0);
    }
}

impl<K: Eq + Hash + Clone, T> Default for TileCache<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, T> TileCache<K, T> {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner::Unbounded(HashMap::default())),
        }
    }

    /// Creates a cache that keeps about `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::Bounded(BoundedCache::new(capacity))),
        }
    }

    /// Returns the entry for the key, if present.
    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        match &mut *self.inner.lock() {
            CacheInner::Unbounded(map) => map.get(key).cloned(),
            CacheInner::Bounded(cache) => cache.get(key),
        }
    }

    /// Returns true if the cache has an entry for the key.
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the entry for the key, creating it with `create` if absent. An existing entry is
    /// never replaced.
    ///
    /// `create` is called with the cache locked, so it must not access the same cache.
    pub fn get_or_insert_with(&self, key: K, create: impl FnOnce() -> T) -> Arc<T> {
        let mut inner = self.inner.lock();
        match &mut *inner {
            CacheInner::Unbounded(map) => map
                .entry(key)
                .or_insert_with(|| Arc::new(create()))
                .clone(),
            CacheInner::Bounded(cache) => {
                if let Some(value) = cache.get(&key) {
                    return value;
                }

                let value = Arc::new(create());
                cache.insert(key, value.clone());
                value
            }
        }
    }

    /// Number of entries held. For bounded caches evicted entries still in use are counted too.
    pub fn len(&self) -> usize {
        match &mut *self.inner.lock() {
            CacheInner::Unbounded(map) => map.len(),
            CacheInner::Bounded(cache) => {
                cache.prune();
                cache.weak.len()
            }
        }
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        match &mut *inner {
            CacheInner::Unbounded(map) => map.clear(),
            CacheInner::Bounded(cache) => *cache = BoundedCache::new(cache.capacity),
        }
    }
}
