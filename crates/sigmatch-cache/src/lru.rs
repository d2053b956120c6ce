//! Sharded LRU cache
//!
//! Entries live in one shared [`DashMap`]. Recency is tracked by `C`
//! independent doubly-linked lists ("shards"), each behind its own mutex. A
//! new entry is assigned to a random shard; when the map grows past capacity
//! the inserting entry's shard drops its own tail. Eviction is therefore only
//! approximately LRU: the oldest `1/C` of the capacity may go before its true
//! turn, in exchange for never serializing unrelated keys on a single lock.
//!
//! Loaders run outside every lock. Two threads missing on the same key may
//! both load it; the first insert wins and the other value is discarded.
//!
//! Lock order is always shard mutex, then map. Map guards are never held
//! while a shard mutex is acquired.

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::stats::{CacheCounters, CacheStats};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rand::{RngExt, rng};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::trace;

/// Sentinel for empty prev/next/head/tail links
const NIL: usize = usize::MAX;

/// A key/value pair plus its position in the owning shard's list
struct CachedItem<K, V> {
    key: K,
    value: V,
    shard: usize,
    /// Slot in the shard's list; read and written under the shard lock only
    slot: AtomicUsize,
    /// Set once linked, cleared on eviction; read and written under the shard lock only
    linked: AtomicBool,
}

impl<K, V> CachedItem<K, V> {
    fn new(key: K, value: V, shard: usize) -> Self {
        Self {
            key,
            value,
            shard,
            slot: AtomicUsize::new(NIL),
            linked: AtomicBool::new(false),
        }
    }
}

struct Slot<K, V> {
    item: Option<Arc<CachedItem<K, V>>>,
    prev: usize,
    next: usize,
}

/// Recency list for one shard, most recently used at the head
///
/// Nodes are stored in a slot arena and linked by index; freed slots are
/// reused by later inserts.
struct ShardList<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<K, V> ShardList<K, V> {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    fn push_front(&mut self, item: Arc<CachedItem<K, V>>) -> usize {
        let slot = Slot {
            item: Some(item),
            prev: NIL,
            next: NIL,
        };
        let index = if let Some(index) = self.free.pop() {
            self.slots[index] = slot;
            index
        } else {
            self.slots.push(slot);
            self.slots.len() - 1
        };

        self.link_front(index);
        self.len += 1;
        index
    }

    fn link_front(&mut self, index: usize) {
        self.slots[index].prev = NIL;
        self.slots[index].next = self.head;
        if self.head == NIL {
            self.tail = index;
        } else {
            self.slots[self.head].prev = index;
        }
        self.head = index;
    }

    fn unlink(&mut self, index: usize) {
        let prev = self.slots[index].prev;
        let next = self.slots[index].next;

        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
    }

    fn move_to_front(&mut self, index: usize) {
        if self.head == index {
            return;
        }
        self.unlink(index);
        self.link_front(index);
    }

    fn pop_back(&mut self) -> Option<Arc<CachedItem<K, V>>> {
        if self.tail == NIL {
            return None;
        }

        let index = self.tail;
        self.unlink(index);
        self.len -= 1;
        self.free.push(index);
        self.slots[index].item.take()
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            if let Some(item) = slot.item.take() {
                item.linked.store(false, Ordering::Relaxed);
            }
        }
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    /// Keys from most to least recently used
    fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::with_capacity(self.len);
        let mut index = self.head;
        while index != NIL {
            if let Some(item) = &self.slots[index].item {
                keys.push(item.key.clone());
            }
            index = self.slots[index].next;
        }
        keys
    }
}

/// Bounded cache approximating LRU eviction across `concurrency` shards
pub struct ShardedLruCache<K, V> {
    map: DashMap<K, Arc<CachedItem<K, V>>>,
    shards: Box<[Mutex<ShardList<K, V>>]>,
    capacity: usize,
    counters: CacheCounters,
}

impl<K, V> ShardedLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache from a validated configuration
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let shards = (0..config.concurrency)
            .map(|_| Mutex::new(ShardList::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            map: DashMap::with_capacity(config.capacity.min(1024)),
            shards,
            capacity: config.capacity,
            counters: CacheCounters::new(config.collect_stats),
        })
    }

    /// Create a cache with the given capacity and shard count
    pub fn with_capacity(capacity: usize, concurrency: usize) -> CacheResult<Self> {
        Self::new(
            &CacheConfig::lru(capacity)
                .with_concurrency(concurrency)
                .with_stats(true),
        )
    }

    /// Return the cached value for `key`, invoking `loader` on a miss
    ///
    /// Loader errors are returned unchanged and nothing is cached for the key.
    pub fn get_or_load<E, F>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        self.counters.record_request();

        if let Some(item) = self.lookup(&key) {
            self.promote(&item);
            return Ok(item.value.clone());
        }

        self.counters.record_miss();
        let value = loader(&key)?;
        let item = Arc::new(CachedItem::new(key.clone(), value, self.random_shard()));

        let winner = match self.map.entry(key) {
            Entry::Occupied(existing) => Some(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&item));
                None
            }
        };

        if let Some(winner) = winner {
            // Another thread inserted first; our value is discarded
            self.promote(&winner);
            return Ok(winner.value.clone());
        }

        self.link(&item);

        if self.map.len() > self.capacity {
            self.evict_tail(item.shard);
        }

        Ok(item.value.clone())
    }

    /// Return the cached value for `key` without loading, marking it recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let item = self.lookup(key)?;
        self.promote(&item);
        Some(item.value.clone())
    }

    /// Check whether `key` is resident without touching its recency
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Remove every entry and reset the counters
    ///
    /// Not synchronized with in-flight `get_or_load` calls; callers must
    /// quiesce lookups first if they need an exact empty state.
    pub fn reset(&self) {
        for shard in &*self.shards {
            shard.lock().clear();
        }
        self.map.clear();
        self.counters.reset();
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Configured capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of shards
    pub fn concurrency(&self) -> usize {
        self.shards.len()
    }

    /// Number of entries linked into each shard
    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(|shard| shard.lock().len).collect()
    }

    /// Keys of each shard ordered from most to least recently used
    pub fn shard_keys(&self) -> Vec<Vec<K>> {
        self.shards.iter().map(|shard| shard.lock().keys()).collect()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            requests: self.counters.requests(),
            misses: self.counters.misses(),
            entries: self.map.len(),
            capacity: self.capacity,
            switches: 0,
        }
    }

    fn lookup(&self, key: &K) -> Option<Arc<CachedItem<K, V>>> {
        self.map.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn random_shard(&self) -> usize {
        if self.shards.len() == 1 {
            0
        } else {
            rng().random_range(0..self.shards.len())
        }
    }

    fn promote(&self, item: &CachedItem<K, V>) {
        let mut shard = self.shards[item.shard].lock();
        // Not yet linked by its inserter, or already evicted
        if item.linked.load(Ordering::Relaxed) {
            shard.move_to_front(item.slot.load(Ordering::Relaxed));
        }
    }

    fn link(&self, item: &Arc<CachedItem<K, V>>) {
        let mut shard = self.shards[item.shard].lock();
        let slot = shard.push_front(Arc::clone(item));
        item.slot.store(slot, Ordering::Relaxed);
        item.linked.store(true, Ordering::Relaxed);
    }

    fn evict_tail(&self, shard_index: usize) {
        let mut shard = self.shards[shard_index].lock();
        if let Some(victim) = shard.pop_back() {
            victim.linked.store(false, Ordering::Relaxed);
            self.map
                .remove_if(&victim.key, |_, current| Arc::ptr_eq(current, &victim));
            trace!(shard = shard_index, "evicted LRU tail");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    fn load_ok(cache: &ShardedLruCache<u32, u32>, key: u32) -> u32 {
        cache
            .get_or_load(key, |k| Ok::<_, Infallible>(k * 10))
            .unwrap()
    }

    #[test]
    fn test_hit_returns_cached_value() {
        let cache = ShardedLruCache::with_capacity(8, 2).unwrap();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_load(7, |k| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, Infallible>(k + 1)
                })
                .unwrap();
            assert_eq!(value, 8);
        }

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        let stats = cache.stats();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_single_shard_is_exact_lru() {
        let cache = ShardedLruCache::with_capacity(3, 1).unwrap();
        load_ok(&cache, 1);
        load_ok(&cache, 2);
        load_ok(&cache, 3);

        // Touch 1 so that 2 becomes least recently used
        assert_eq!(cache.get(&1), Some(10));
        load_ok(&cache, 4);

        assert!(cache.contains_key(&1));
        assert!(!cache.contains_key(&2));
        assert!(cache.contains_key(&3));
        assert!(cache.contains_key(&4));
        assert_eq!(cache.shard_keys(), vec![vec![4, 1, 3]]);
    }

    #[test]
    fn test_loader_error_is_not_cached() {
        let cache: ShardedLruCache<u32, u32> = ShardedLruCache::with_capacity(4, 2).unwrap();

        let result = cache.get_or_load(1, |_| Err("decode failed"));
        assert_eq!(result, Err("decode failed"));
        assert!(!cache.contains_key(&1));
        assert!(cache.is_empty());

        let value = cache.get_or_load(1, |_| Ok::<_, &str>(5)).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_reset_forces_reload() {
        let cache = ShardedLruCache::with_capacity(4, 2).unwrap();
        let calls = AtomicU32::new(0);
        let load = |k: &u32| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Infallible>(*k)
        };

        cache.get_or_load(1, load).unwrap();
        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().requests, 0);
        assert!(cache.shard_sizes().iter().all(|&n| n == 0));

        cache.get_or_load(1, load).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_slots_are_reused_after_eviction() {
        let cache = ShardedLruCache::with_capacity(2, 1).unwrap();
        for key in 0..100 {
            load_ok(&cache, key);
        }
        assert!(cache.len() <= 3);
        let shard = cache.shards[0].lock();
        assert!(shard.slots.len() <= 3);
    }

    #[test]
    fn test_concurrent_loads_agree() {
        let cache = Arc::new(ShardedLruCache::with_capacity(64, 8).unwrap());

        thread::scope(|scope| {
            for t in 0..8u32 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..500u32 {
                        let key = (i * 7 + t) % 200;
                        let value = cache
                            .get_or_load(key, |k| Ok::<_, Infallible>(k * 3))
                            .unwrap();
                        assert_eq!(value, key * 3);
                    }
                });
            }
        });

        // One pending eviction per shard at most
        assert!(cache.len() <= 64 + 8);
        let linked: usize = cache.shard_sizes().iter().sum();
        assert_eq!(linked, cache.len());
    }

    proptest! {
        #[test]
        fn prop_resident_set_is_bounded(
            capacity in 1usize..64,
            concurrency in 1usize..9,
            inserts in 1u32..400,
        ) {
            let cache = ShardedLruCache::with_capacity(capacity, concurrency).unwrap();
            for key in 0..inserts {
                cache.get_or_load(key, |k| Ok::<_, Infallible>(*k)).unwrap();
            }
            prop_assert!(cache.len() <= capacity + concurrency);
            let linked: usize = cache.shard_sizes().iter().sum();
            prop_assert_eq!(linked, cache.len());
        }

        #[test]
        fn prop_resident_values_match_loader(keys in proptest::collection::vec(0u32..50, 1..200)) {
            let cache = ShardedLruCache::with_capacity(16, 4).unwrap();
            for key in keys {
                let value = cache.get_or_load(key, |k| Ok::<_, Infallible>(k ^ 0xA5)).unwrap();
                prop_assert_eq!(value, key ^ 0xA5);
            }
        }
    }
}
