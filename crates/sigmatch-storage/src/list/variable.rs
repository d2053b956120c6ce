use super::load_record;
use crate::error::{StorageError, StorageResult};
use crate::header::ListHeader;
use crate::pool::{PooledReader, ReaderPool};
use crate::record::RecordDecoder;
use sigmatch_cache::{Cache, CacheConfig, CacheStats};
use std::sync::Arc;

/// List of variable-length records addressed by byte offset within the list
pub struct VariableRecordList<D: RecordDecoder> {
    pool: Arc<ReaderPool>,
    header: ListHeader,
    decoder: D,
    cache: Cache<u32, Arc<D::Record>>,
}

impl<D: RecordDecoder> VariableRecordList<D> {
    /// Create a list over `header`'s region of the pool's source
    pub fn new(
        pool: Arc<ReaderPool>,
        header: ListHeader,
        decoder: D,
        cache: &CacheConfig,
    ) -> StorageResult<Self> {
        header.validate(pool.source_len()?)?;
        if (header.count == 0) != (header.length == 0) {
            return Err(StorageError::Decode(format!(
                "variable list of {} records in {} bytes",
                header.count, header.length
            )));
        }
        Ok(Self {
            pool,
            header,
            decoder,
            cache: Cache::new(cache)?,
        })
    }

    /// Record starting `offset` bytes into the list
    pub fn get(&self, offset: u32) -> StorageResult<Arc<D::Record>> {
        if offset >= self.header.length {
            return Err(StorageError::KeyOutOfRange {
                key: offset,
                limit: self.header.length,
            });
        }
        self.cache.get_or_load(offset, |&offset| {
            load_record(&self.pool, &self.decoder, offset, self.absolute(offset))
        })
    }

    /// Walk every record from offset 0, yielding `(offset, record)`
    ///
    /// The next offset is the previous one plus the bytes its decode
    /// consumed. One reader is held until the iterator is dropped.
    pub fn iter(&self) -> StorageResult<VariableIter<'_, D>> {
        let reader = self.pool.checkout()?;
        Ok(VariableIter {
            list: self,
            reader,
            next: Some(0),
        })
    }

    /// Number of records recorded in the header
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

    fn absolute(&self, offset: u32) -> u64 {
        u64::from(self.header.start_position) + u64::from(offset)
    }
}

impl<D: RecordDecoder> std::fmt::Debug for VariableRecordList<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableRecordList")
            .field("header", &self.header)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Sequential walk over a [`VariableRecordList`]
///
/// Records are decoded directly and do not pass through the cache. The walk
/// stops after the first error.
pub struct VariableIter<'a, D: RecordDecoder> {
    list: &'a VariableRecordList<D>,
    reader: PooledReader<'a>,
    /// `None` once exhausted or failed
    next: Option<u32>,
}

impl<D: RecordDecoder> VariableIter<'_, D> {
    fn decode_at(&mut self, offset: u32) -> StorageResult<(D::Record, u32)> {
        let start = self.list.absolute(offset);
        self.reader.seek_to(start)?;
        let record = self.list.decoder.decode(&mut self.reader, offset)?;

        let consumed = self.reader.position()?.saturating_sub(start);
        if consumed == 0 {
            return Err(StorageError::Decode(format!(
                "record at offset {offset} consumed no bytes"
            )));
        }
        let next = u64::from(offset) + consumed;
        Ok((record, u32::try_from(next).unwrap_or(u32::MAX)))
    }
}

impl<D: RecordDecoder> Iterator for VariableIter<'_, D> {
    type Item = StorageResult<(u32, D::Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.filter(|&offset| offset < self.list.header.length)?;

        match self.decode_at(offset) {
            Ok((record, next)) => {
                self.next = Some(next);
                Some(Ok((offset, record)))
            }
            Err(e) => {
                self.next = None;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::{DataSource, SourceReader};

    /// `u8 length + bytes`
    struct Blob;

    impl RecordDecoder for Blob {
        type Record = Vec<u8>;

        fn decode(&self, reader: &mut SourceReader, _key: u32) -> StorageResult<Vec<u8>> {
            let len: u8 = reader.read_le()?;
            let offset = reader.position()?;
            let bytes = reader.read_at(offset, usize::from(len))?;
            Ok(bytes)
        }
    }

    fn list() -> VariableRecordList<Blob> {
        // Two padding bytes, then records "ab", "", "xyz"
        let data = vec![0, 0, 2, b'a', b'b', 0, 3, b'x', b'y', b'z'];
        let pool = Arc::new(ReaderPool::new(DataSource::from_bytes(data)));
        let header = ListHeader {
            start_position: 2,
            length: 8,
            count: 3,
        };
        VariableRecordList::new(pool, header, Blob, &CacheConfig::switching(8)).unwrap()
    }

    #[test]
    fn test_get_by_offset() {
        let list = list();
        assert_eq!(*list.get(0).unwrap(), b"ab".to_vec());
        assert_eq!(*list.get(4).unwrap(), b"xyz".to_vec());
        assert!(list.get(3).unwrap().is_empty());
        assert!(matches!(
            list.get(8),
            Err(StorageError::KeyOutOfRange { key: 8, limit: 8 })
        ));
    }

    #[test]
    fn test_iter_chains_offsets() {
        let list = list();
        let records: Vec<(u32, Vec<u8>)> = list.iter().unwrap().map(Result::unwrap).collect();
        assert_eq!(
            records,
            vec![(0, b"ab".to_vec()), (3, Vec::new()), (4, b"xyz".to_vec())]
        );
        assert_eq!(list.cache_size(), 0);
        assert_eq!(list.pool().stats().in_use, 0);
    }

    #[test]
    fn test_iter_stops_after_error() {
        let data = vec![1, b'a', 9, b'b'];
        let pool = Arc::new(ReaderPool::new(DataSource::from_bytes(data)));
        let header = ListHeader {
            start_position: 0,
            length: 4,
            count: 2,
        };
        let list = VariableRecordList::new(pool, header, Blob, &CacheConfig::lru(4)).unwrap();

        let mut iter = list.iter().unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_empty_list_agrees_on_len() {
        let pool = Arc::new(ReaderPool::new(DataSource::from_bytes(vec![7, 7])));
        let empty = ListHeader {
            start_position: 2,
            length: 0,
            count: 0,
        };
        let list =
            VariableRecordList::new(Arc::clone(&pool), empty, Blob, &CacheConfig::lru(4)).unwrap();
        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert!(list.iter().unwrap().next().is_none());

        let list = self::list();
        assert_eq!(list.len(), 3);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_count_and_length_must_agree_on_emptiness() {
        let pool = Arc::new(ReaderPool::new(DataSource::from_bytes(vec![1, b'a'])));
        let no_records = ListHeader {
            start_position: 0,
            length: 2,
            count: 0,
        };
        assert!(matches!(
            VariableRecordList::new(Arc::clone(&pool), no_records, Blob, &CacheConfig::lru(4)),
            Err(StorageError::Decode(_))
        ));

        let no_bytes = ListHeader {
            start_position: 0,
            length: 0,
            count: 1,
        };
        assert!(matches!(
            VariableRecordList::new(pool, no_bytes, Blob, &CacheConfig::lru(4)),
            Err(StorageError::Decode(_))
        ));
    }
}
