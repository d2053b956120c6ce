//! Pool of reusable reader handles over one data source
//!
//! Checkout never blocks and never caps the number of handles: an idle
//! handle is reused when one exists, otherwise a new one is constructed.
//! The number of handles therefore tracks peak concurrency.
//!
//! Checkout returns a [`PooledReader`] guard. The handle goes back to the
//! idle set when the guard is dropped, so every exit path (errors and
//! unwinding included) releases it.

use crate::error::{StorageError, StorageResult};
use crate::source::{AccessMode, DataSource, SourceReader};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    /// Handles constructed since the pool was created
    pub created: usize,
    /// Handles waiting in the idle set
    pub idle: usize,
    /// Handles currently checked out
    pub in_use: usize,
}

/// Reusable reader handles bound to one [`DataSource`]
pub struct ReaderPool {
    /// `None` once closed
    source: RwLock<Option<Arc<DataSource>>>,
    idle: Mutex<Vec<SourceReader>>,
    created: AtomicUsize,
    in_use: AtomicUsize,
}

impl ReaderPool {
    /// Create a pool over an opened source
    pub fn new(source: DataSource) -> Self {
        Self {
            source: RwLock::new(Some(Arc::new(source))),
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
        }
    }

    /// Open `path` and create a pool over it
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> StorageResult<Self> {
        DataSource::open(path, mode).map(Self::new)
    }

    /// Take an exclusive reader handle
    pub fn checkout(&self) -> StorageResult<PooledReader<'_>> {
        let reader = {
            let source = self.source.read();
            let source = source.as_ref().ok_or(StorageError::Closed)?;
            let reused = self.idle.lock().pop();
            match reused {
                Some(reader) => reader,
                None => {
                    let reader = source.reader()?;
                    self.created.fetch_add(1, Ordering::Relaxed);
                    reader
                }
            }
        };

        self.in_use.fetch_add(1, Ordering::Relaxed);
        Ok(PooledReader {
            pool: self,
            reader: ManuallyDrop::new(reader),
        })
    }

    /// Return a handle to the idle set, or drop it when the pool is closed
    fn release(&self, reader: SourceReader) {
        {
            let source = self.source.read();
            if source.is_some() {
                self.idle.lock().push(reader);
            }
        }
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    /// Release the backing source and every idle handle
    ///
    /// Handles still checked out are dropped when their guards are. Calling
    /// `close` twice is harmless.
    pub fn close(&self) {
        let source = self.source.write().take();
        let drained = {
            let mut idle = self.idle.lock();
            let count = idle.len();
            idle.clear();
            count
        };

        if source.is_some() {
            debug!(
                "Closed reader pool: {} handles created, {drained} idle released",
                self.created.load(Ordering::Relaxed)
            );
        }
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.source.read().is_none()
    }

    /// Size of the backing source
    pub fn source_len(&self) -> StorageResult<u64> {
        self.source
            .read()
            .as_ref()
            .map(|source| source.len())
            .ok_or(StorageError::Closed)
    }

    /// Access mode of the backing source
    pub fn access_mode(&self) -> StorageResult<AccessMode> {
        self.source
            .read()
            .as_ref()
            .map(|source| source.mode())
            .ok_or(StorageError::Closed)
    }

    /// Current counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
            in_use: self.in_use.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ReaderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderPool")
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

/// A checked-out reader, released back to its pool on drop
pub struct PooledReader<'a> {
    pool: &'a ReaderPool,
    reader: ManuallyDrop<SourceReader>,
}

impl PooledReader<'_> {
    /// Release the handle now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledReader<'_> {
    type Target = SourceReader;

    fn deref(&self) -> &SourceReader {
        &self.reader
    }
}

impl DerefMut for PooledReader<'_> {
    fn deref_mut(&mut self) -> &mut SourceReader {
        &mut self.reader
    }
}

impl Drop for PooledReader<'_> {
    fn drop(&mut self) {
        // SAFETY: `reader` is never touched again after this take.
        #[allow(unsafe_code)]
        let reader = unsafe { ManuallyDrop::take(&mut self.reader) };
        self.pool.release(reader);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn pool() -> ReaderPool {
        ReaderPool::new(DataSource::from_bytes((0u8..64).collect::<Vec<_>>()))
    }

    #[test]
    fn test_checkout_reuses_idle_handle() {
        let pool = pool();
        {
            let mut reader = pool.checkout().unwrap();
            assert_eq!(reader.read_at(10, 2).unwrap(), vec![10, 11]);
        }
        let _reader = pool.checkout().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn test_concurrent_checkouts_create_handles() {
        let pool = pool();
        let a = pool.checkout().unwrap();
        let b = pool.checkout().unwrap();
        assert_eq!(pool.stats().created, 2);
        assert_eq!(pool.stats().in_use, 2);

        a.release();
        drop(b);
        assert_eq!(
            pool.stats(),
            PoolStats {
                created: 2,
                idle: 2,
                in_use: 0
            }
        );
    }

    #[test]
    fn test_handles_are_positioned_independently() {
        let pool = pool();
        let mut a = pool.checkout().unwrap();
        let mut b = pool.checkout().unwrap();
        a.seek_to(5).unwrap();
        b.seek_to(40).unwrap();
        assert_eq!(a.read_le::<u8>().unwrap(), 5);
        assert_eq!(b.read_le::<u8>().unwrap(), 40);
    }

    #[test]
    fn test_failed_read_still_releases() {
        let pool = pool();
        let result = pool.checkout().and_then(|mut reader| reader.read_at(60, 10));
        assert!(result.is_err());
        assert_eq!(pool.stats().in_use, 0);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn test_release_after_use_returns_same_handle() {
        let pool = pool();
        let mut reader = pool.checkout().unwrap();
        reader.seek_to(30).unwrap();
        reader.release();
        assert_eq!(pool.stats().idle, 1);
        assert_eq!(pool.stats().in_use, 0);

        // The reused handle keeps working after going through the idle set
        let mut reader = pool.checkout().unwrap();
        assert_eq!(reader.read_at(1, 2).unwrap(), vec![1, 2]);
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn test_unwinding_releases_handle() {
        let pool = pool();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _reader = pool.checkout().unwrap();
            panic!("decode blew up");
        }));
        assert!(outcome.is_err());
        assert_eq!(pool.stats().in_use, 0);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn test_close_drains_and_rejects_checkout() {
        let pool = pool();
        let held = pool.checkout().unwrap();
        drop(pool.checkout().unwrap());
        assert_eq!(pool.stats().idle, 1);

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.stats().idle, 0);
        assert!(matches!(pool.checkout(), Err(StorageError::Closed)));
        assert!(matches!(pool.source_len(), Err(StorageError::Closed)));

        // Handles outstanding at close are dropped, not pooled
        drop(held);
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().in_use, 0);

        pool.close();
    }
}
