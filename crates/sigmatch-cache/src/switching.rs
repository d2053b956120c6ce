//! Generational switching cache
//!
//! Two maps are kept: `active`, which lookups are served from, and
//! `background`, which collects every key touched since the last switch.
//! When `background` grows past half the capacity a switch is requested from
//! a dedicated worker thread, which swaps the two maps and starts a fresh
//! background generation. After a switch the resident set is exactly the
//! keys touched during the previous generation, regardless of their order.
//!
//! At most one switch is pending at a time. Requests made while one is
//! pending are dropped.

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::stats::{CacheCounters, CacheStats};
use crossbeam_channel::{Sender, TrySendError, bounded};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, warn};

type Generation<K, V> = Arc<DashMap<K, V>>;

/// State shared between the cache handle and its switch worker
struct Generations<K, V> {
    active: RwLock<Generation<K, V>>,
    background: RwLock<Generation<K, V>>,
    /// Half of the configured capacity
    threshold: usize,
    switch_pending: AtomicBool,
    switches: AtomicU64,
}

impl<K, V> Generations<K, V>
where
    K: Eq + Hash,
{
    fn new(threshold: usize) -> Self {
        Self {
            active: RwLock::new(Arc::new(DashMap::with_capacity(threshold.min(1024)))),
            background: RwLock::new(Arc::new(DashMap::with_capacity(threshold.min(1024)))),
            threshold,
            switch_pending: AtomicBool::new(false),
            switches: AtomicU64::new(0),
        }
    }

    fn switch(&self) {
        let retired = {
            let mut active = self.active.write();
            let mut background = self.background.write();
            std::mem::swap(&mut *active, &mut *background);
            let fresh = Arc::new(DashMap::with_capacity(self.threshold.min(1024)));
            std::mem::replace(&mut *background, fresh)
        };

        let switches = self.switches.fetch_add(1, Ordering::Relaxed) + 1;
        self.switch_pending.store(false, Ordering::Release);
        debug!(
            switches,
            retired = retired.len(),
            "switched cache generations"
        );
    }
}

/// Bounded cache approximating LRU with two generations
pub struct SwitchingCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    generations: Arc<Generations<K, V>>,
    capacity: usize,
    counters: CacheCounters,
    requests: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<K, V> SwitchingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache from a validated configuration and start its worker
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let generations = Arc::new(Generations::new(config.capacity / 2));
        // One slot is enough: at most one switch is ever pending
        let (sender, receiver) = bounded::<()>(1);

        let worker_generations = Arc::clone(&generations);
        let worker = std::thread::Builder::new()
            .name("sigmatch-cache-switch".to_string())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    worker_generations.switch();
                }
            })?;

        Ok(Self {
            generations,
            capacity: config.capacity,
            counters: CacheCounters::new(config.collect_stats),
            requests: Some(sender),
            worker: Some(worker),
        })
    }

    /// Create a cache with the given capacity
    pub fn with_capacity(capacity: usize) -> CacheResult<Self> {
        Self::new(&CacheConfig::switching(capacity).with_stats(true))
    }

    /// Return the cached value for `key`, invoking `loader` on a miss
    ///
    /// Loader errors are returned unchanged and nothing is cached for the key.
    pub fn get_or_load<E, F>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        self.counters.record_request();

        let active = Arc::clone(&self.generations.active.read());
        if let Some(value) = active.get(&key).map(|entry| entry.value().clone()) {
            self.touch(key, value.clone());
            return Ok(value);
        }

        self.counters.record_miss();
        let value = loader(&key)?;
        let value = active
            .entry(key.clone())
            .or_insert(value)
            .value()
            .clone();
        self.touch(key, value.clone());
        Ok(value)
    }

    /// Return the cached value for `key` without loading
    ///
    /// A hit counts as a touch for the next generation.
    pub fn get(&self, key: &K) -> Option<V> {
        let active = Arc::clone(&self.generations.active.read());
        let value = active.get(key).map(|entry| entry.value().clone())?;
        self.touch(key.clone(), value.clone());
        Some(value)
    }

    /// Check whether `key` is in the active generation
    pub fn contains_key(&self, key: &K) -> bool {
        self.generations.active.read().contains_key(key)
    }

    /// Check whether `key` has been touched in the current background generation
    pub fn touched(&self, key: &K) -> bool {
        self.generations.background.read().contains_key(key)
    }

    /// Swap generations on the calling thread
    ///
    /// Normally switches happen on the worker; this is for callers that need
    /// a deterministic generation boundary. When a switch is already pending
    /// no second one is made: the call waits for the pending switch instead.
    pub fn switch_now(&self) {
        if self
            .generations
            .switch_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.generations.switch();
            return;
        }

        while self.generations.switch_pending.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
    }

    /// Whether a background switch has been requested but not yet performed
    pub fn switch_pending(&self) -> bool {
        self.generations.switch_pending.load(Ordering::Acquire)
    }

    /// Number of generation switches performed
    pub fn switches(&self) -> u64 {
        self.generations.switches.load(Ordering::Relaxed)
    }

    /// Remove every entry from both generations and reset the counters
    pub fn reset(&self) {
        self.generations.active.read().clear();
        self.generations.background.read().clear();
        self.generations.switches.store(0, Ordering::Relaxed);
        self.counters.reset();
    }

    /// Number of entries in the active generation
    pub fn len(&self) -> usize {
        self.generations.active.read().len()
    }

    /// Whether the active generation is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            requests: self.counters.requests(),
            misses: self.counters.misses(),
            entries: self.len(),
            capacity: self.capacity,
            switches: self.switches(),
        }
    }

    fn touch(&self, key: K, value: V) {
        let background = Arc::clone(&self.generations.background.read());
        background.entry(key).or_insert(value);

        if background.len() > self.generations.threshold {
            self.request_switch();
        }
    }

    fn request_switch(&self) {
        if self
            .generations
            .switch_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let Some(requests) = &self.requests else {
            self.generations
                .switch_pending
                .store(false, Ordering::Release);
            return;
        };

        match requests.try_send(()) {
            // A queued request is already waiting for the worker
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                warn!("cache switch worker is gone; switching on the caller");
                self.generations.switch();
            }
        }
    }
}

impl<K, V> Drop for SwitchingCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.requests.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("cache switch worker panicked");
        }
    }
}
