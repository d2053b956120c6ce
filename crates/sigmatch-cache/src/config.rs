//! Cache configuration
//!
//! A single [`CacheConfig`] describes either cache strategy. Constructors
//! validate it up front so that a bad capacity or shard count fails when the
//! dataset is opened, never on the lookup path.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default number of entries held by a cache
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Fallback shard count when the available parallelism is unknown
const FALLBACK_CONCURRENCY: usize = 4;

/// Which cache implementation fronts a record list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Sharded LRU with per-shard recency lists
    #[default]
    Lru,
    /// Two generations swapped by a background worker
    Switching,
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Switching => write!(f, "switching"),
        }
    }
}

impl std::str::FromStr for CacheStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "switching" => Ok(Self::Switching),
            other => Err(CacheError::InvalidConfiguration(format!(
                "unknown cache strategy '{other}'"
            ))),
        }
    }
}

/// Configuration shared by both cache strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache implementation
    pub strategy: CacheStrategy,
    /// Soft upper bound on the number of resident entries
    pub capacity: usize,
    /// Number of LRU shards (ignored by the switching cache)
    pub concurrency: usize,
    /// Enable request/miss counters
    pub collect_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::Lru,
            capacity: DEFAULT_CAPACITY,
            concurrency: default_concurrency(),
            collect_stats: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// LRU configuration with the given capacity
    pub fn lru(capacity: usize) -> Self {
        Self {
            strategy: CacheStrategy::Lru,
            capacity,
            ..Self::default()
        }
    }

    /// Switching configuration with the given capacity
    pub fn switching(capacity: usize) -> Self {
        Self {
            strategy: CacheStrategy::Switching,
            capacity,
            ..Self::default()
        }
    }

    /// Set the cache strategy
    #[must_use]
    pub const fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the capacity
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the number of LRU shards
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable or disable request/miss counters
    #[must_use]
    pub const fn with_stats(mut self, enabled: bool) -> Self {
        self.collect_stats = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> CacheResult<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfiguration(
                "capacity must be greater than 0".to_string(),
            ));
        }

        match self.strategy {
            CacheStrategy::Lru => {
                if self.concurrency == 0 {
                    return Err(CacheError::InvalidConfiguration(
                        "concurrency must be greater than 0".to_string(),
                    ));
                }
            }
            CacheStrategy::Switching => {
                // Each generation holds half of the capacity.
                if self.capacity < 2 {
                    return Err(CacheError::InvalidConfiguration(
                        "switching cache capacity must be at least 2".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Shard count derived from the machine's available parallelism
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(FALLBACK_CONCURRENCY, NonZeroUsize::get)
}
