//! Cache counters and statistics snapshots
//!
//! Counters are relaxed atomics. Under contention they may lag the true
//! number of operations, but every increment corresponds to a real request
//! or miss, so they never run ahead of the work actually performed.
#![allow(clippy::cast_precision_loss)] // Ratios intentionally accept precision loss

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// Keep hot counters on separate cache lines
#[repr(align(64))]
#[derive(Debug, Default)]
struct CacheAlignedAtomicU64(AtomicU64);

impl CacheAlignedAtomicU64 {
    #[inline]
    fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Request and miss counters, switched off entirely when disabled
#[derive(Debug)]
pub(crate) struct CacheCounters {
    enabled: bool,
    requests: CacheAlignedAtomicU64,
    misses: CacheAlignedAtomicU64,
}

impl CacheCounters {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            requests: CacheAlignedAtomicU64::default(),
            misses: CacheAlignedAtomicU64::default(),
        }
    }

    #[inline]
    pub(crate) fn record_request(&self) {
        if self.enabled {
            self.requests.increment();
        }
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        if self.enabled {
            self.misses.increment();
        }
    }

    pub(crate) fn requests(&self) -> u64 {
        self.requests.load()
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses.load()
    }

    pub(crate) fn reset(&self) {
        self.requests.reset();
        self.misses.reset();
    }
}

/// Point-in-time view of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Number of `get_or_load` calls (0 when stats are disabled)
    pub requests: u64,
    /// Number of loader invocations (0 when stats are disabled)
    pub misses: u64,
    /// Entries currently resident
    pub entries: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Generation switches performed (switching cache only)
    pub switches: u64,
}

impl CacheStats {
    /// Fraction of requests served without invoking the loader
    #[inline]
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            let hits = self.requests.saturating_sub(self.misses);
            hits as f64 / self.requests as f64
        }
    }

    /// Fraction of requests that invoked the loader
    #[inline]
    pub fn miss_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            1.0 - self.hit_ratio()
        }
    }
}
