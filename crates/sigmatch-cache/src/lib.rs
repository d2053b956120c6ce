//! Bounded concurrent caches for lazily decoded records
//!
//! Two strategies are provided, both keyed lookups with a caller-supplied
//! loader that runs outside every cache lock:
//!
//! - [`ShardedLruCache`]: approximate LRU with recency tracked across
//!   independently locked shards
//! - [`SwitchingCache`]: two generations swapped by a background worker,
//!   cheaper per access when reads dominate churn
//!
//! [`Cache`] selects one of them from a [`CacheConfig`].
//!
//! # Example
//!
//! ```rust
//! use sigmatch_cache::{Cache, CacheConfig};
//! use std::convert::Infallible;
//!
//! let cache: Cache<u32, String> = Cache::new(&CacheConfig::lru(1_000))?;
//! let value = cache.get_or_load(42, |key| Ok::<_, Infallible>(key.to_string()));
//! assert_eq!(value.ok().as_deref(), Some("42"));
//! # Ok::<(), sigmatch_cache::CacheError>(())
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod lru;
pub mod stats;
pub mod switching;

pub use cache::Cache;
pub use config::{CacheConfig, CacheStrategy, DEFAULT_CAPACITY, default_concurrency};
pub use error::{CacheError, CacheResult};
pub use lru::ShardedLruCache;
pub use stats::CacheStats;
pub use switching::SwitchingCache;
