use super::load_record;
use crate::error::{StorageError, StorageResult};
use crate::header::ListHeader;
use crate::pool::{PooledReader, ReaderPool};
use crate::record::FixedRecordDecoder;
use sigmatch_cache::{Cache, CacheConfig, CacheStats};
use std::sync::Arc;

/// List of fixed-length records addressed by 0-based index
pub struct FixedRecordList<D: FixedRecordDecoder> {
    pool: Arc<ReaderPool>,
    header: ListHeader,
    decoder: D,
    cache: Cache<u32, Arc<D::Record>>,
}

impl<D: FixedRecordDecoder> FixedRecordList<D> {
    /// Create a list over `header`'s region of the pool's source
    pub fn new(
        pool: Arc<ReaderPool>,
        header: ListHeader,
        decoder: D,
        cache: &CacheConfig,
    ) -> StorageResult<Self> {
        header.validate(pool.source_len()?)?;

        let needed = u64::from(header.count) * u64::from(decoder.record_length());
        if needed > u64::from(header.length) {
            return Err(StorageError::Decode(format!(
                "list of {} records of {} bytes does not fit in {} bytes",
                header.count,
                decoder.record_length(),
                header.length
            )));
        }

        Ok(Self {
            pool,
            header,
            decoder,
            cache: Cache::new(cache)?,
        })
    }

    /// Record at `index`, decoding it on a cache miss
    pub fn get(&self, index: u32) -> StorageResult<Arc<D::Record>> {
        self.check_index(index)?;
        self.cache
            .get_or_load(index, |&index| {
                load_record(&self.pool, &self.decoder, index, self.offset_of(index))
            })
    }

    /// Restartable walk over `[start, start + count)`
    pub fn range(&self, start: u32, count: u32) -> StorageResult<RecordRange<'_, D>> {
        let end = start.checked_add(count).ok_or(StorageError::KeyOutOfRange {
            key: start,
            limit: self.header.count,
        })?;
        if end > self.header.count {
            return Err(StorageError::KeyOutOfRange {
                key: end,
                limit: self.header.count,
            });
        }
        Ok(RecordRange {
            list: self,
            start,
            end,
        })
    }

    /// Number of records
    pub const fn len(&self) -> u32 {
        self.header.count
    }

    /// Whether the list has no records
    pub const fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    /// Location of the list in the source
    pub const fn header(&self) -> &ListHeader {
        &self.header
    }

    /// The pool records are read through
    pub const fn pool(&self) -> &Arc<ReaderPool> {
        &self.pool
    }

    /// Drop every cached record
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    /// Fraction of `get` calls served from the cache
    pub fn cache_hit_ratio(&self) -> f64 {
        self.cache.hit_ratio()
    }

    /// Number of cached records
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn check_index(&self, index: u32) -> StorageResult<()> {
        if index >= self.header.count {
            return Err(StorageError::KeyOutOfRange {
                key: index,
                limit: self.header.count,
            });
        }
        Ok(())
    }

    fn offset_of(&self, index: u32) -> u64 {
        u64::from(self.header.start_position)
            + u64::from(index) * u64::from(self.decoder.record_length())
    }
}

impl<D: FixedRecordDecoder> std::fmt::Debug for FixedRecordList<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedRecordList")
            .field("header", &self.header)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// A bounded index range of a [`FixedRecordList`]
///
/// Each call to [`iter`](Self::iter) starts a fresh walk from the first
/// index of the range.
pub struct RecordRange<'a, D: FixedRecordDecoder> {
    list: &'a FixedRecordList<D>,
    start: u32,
    end: u32,
}

impl<'a, D: FixedRecordDecoder> RecordRange<'a, D> {
    /// Start a walk, holding one reader until the iterator is dropped
    pub fn iter(&self) -> StorageResult<RangeIter<'a, D>> {
        let list = self.list;
        let mut reader = list.pool.checkout()?;
        if self.start < self.end {
            reader.seek_to(list.offset_of(self.start))?;
        }
        Ok(RangeIter {
            list,
            reader,
            next: self.start,
            end: self.end,
        })
    }

    /// Number of records in the range
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the range is empty
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Iterator over a [`RecordRange`]
///
/// Records are decoded sequentially and do not pass through the cache.
/// The walk stops after the first error.
pub struct RangeIter<'a, D: FixedRecordDecoder> {
    list: &'a FixedRecordList<D>,
    reader: PooledReader<'a>,
    next: u32,
    end: u32,
}

impl<D: FixedRecordDecoder> Iterator for RangeIter<'_, D> {
    type Item = StorageResult<D::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }

        let index = self.next;
        let offset = self.list.offset_of(index);
        let result = self
            .reader
            .seek_to(offset)
            .and_then(|()| self.list.decoder.decode(&mut self.reader, index));

        self.next = if result.is_ok() { index + 1 } else { self.end };
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}
