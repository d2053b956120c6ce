//! Strategy-dispatched cache
//!
//! Record lists are fronted by whichever strategy the configuration names.
//! The set of strategies is closed, so dispatch is a plain enum match.

use crate::config::{CacheConfig, CacheStrategy};
use crate::error::CacheResult;
use crate::lru::ShardedLruCache;
use crate::stats::CacheStats;
use crate::switching::SwitchingCache;
use std::hash::Hash;

/// A cache built from a [`CacheConfig`]
pub enum Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Sharded LRU cache
    Lru(ShardedLruCache<K, V>),
    /// Generational switching cache
    Switching(SwitchingCache<K, V>),
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Build the cache named by `config.strategy`
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        match config.strategy {
            CacheStrategy::Lru => ShardedLruCache::new(config).map(Self::Lru),
            CacheStrategy::Switching => SwitchingCache::new(config).map(Self::Switching),
        }
    }

    /// Return the cached value for `key`, invoking `loader` on a miss
    pub fn get_or_load<E, F>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        match self {
            Self::Lru(cache) => cache.get_or_load(key, loader),
            Self::Switching(cache) => cache.get_or_load(key, loader),
        }
    }

    /// Check whether `key` is resident
    pub fn contains_key(&self, key: &K) -> bool {
        match self {
            Self::Lru(cache) => cache.contains_key(key),
            Self::Switching(cache) => cache.contains_key(key),
        }
    }

    /// Remove every entry and reset the counters
    pub fn reset(&self) {
        match self {
            Self::Lru(cache) => cache.reset(),
            Self::Switching(cache) => cache.reset(),
        }
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        match self {
            Self::Lru(cache) => cache.len(),
            Self::Switching(cache) => cache.len(),
        }
    }

    /// Whether no entries are resident
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strategy of this cache
    pub const fn strategy(&self) -> CacheStrategy {
        match self {
            Self::Lru(_) => CacheStrategy::Lru,
            Self::Switching(_) => CacheStrategy::Switching,
        }
    }

    /// Statistics snapshot
    pub fn stats(&self) -> CacheStats {
        match self {
            Self::Lru(cache) => cache.stats(),
            Self::Switching(cache) => cache.stats(),
        }
    }

    /// Fraction of requests served without loading
    pub fn hit_ratio(&self) -> f64 {
        self.stats().hit_ratio()
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("strategy", &self.strategy())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn test_strategy_dispatch() {
        for config in [CacheConfig::lru(8), CacheConfig::switching(8)] {
            let cache: Cache<u32, String> = Cache::new(&config).unwrap();
            assert_eq!(cache.strategy(), config.strategy);

            let value = cache
                .get_or_load(4, |k| Ok::<_, Infallible>(format!("record-{k}")))
                .unwrap();
            assert_eq!(value, "record-4");
            assert!(cache.contains_key(&4));
            assert_eq!(cache.len(), 1);

            cache.reset();
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        assert!(Cache::<u32, u32>::new(&CacheConfig::lru(0)).is_err());
        assert!(Cache::<u32, u32>::new(&CacheConfig::switching(1)).is_err());
    }
}
