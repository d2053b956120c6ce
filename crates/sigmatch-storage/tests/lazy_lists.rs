#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Record list behaviour across access modes, failures and threads

use pretty_assertions::assert_eq;
use sigmatch_cache::CacheConfig;
use sigmatch_storage::{
    AccessMode, FixedRecordDecoder, FixedRecordList, LeDecoder, ListHeader, ReaderPool,
    RecordDecoder, SourceReader, StorageError, StorageResult, VariableRecordList,
};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::NamedTempFile;

fn write_u32_file(values: &[u32]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    for value in values {
        file.write_all(&value.to_le_bytes()).expect("write value");
    }
    file.flush().expect("flush");
    file
}

/// Decodes a u32 and fails for odd values, counting every call
struct EvenOnly {
    calls: Arc<AtomicUsize>,
}

impl RecordDecoder for EvenOnly {
    type Record = u32;

    fn decode(&self, reader: &mut SourceReader, key: u32) -> StorageResult<u32> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let value: u32 = reader.read_le()?;
        if value % 2 == 1 {
            return Err(StorageError::Decode(format!("odd value at key {key}")));
        }
        Ok(value)
    }
}

impl FixedRecordDecoder for EvenOnly {
    fn record_length(&self) -> u32 {
        4
    }
}

#[test]
fn every_access_mode_serves_identical_records() {
    let values: Vec<u32> = (0..256).map(|i| i * 3).collect();
    let file = write_u32_file(&values);

    for mode in [AccessMode::Mapped, AccessMode::File, AccessMode::Memory] {
        let pool = Arc::new(ReaderPool::open(file.path(), mode).unwrap());
        assert_eq!(pool.access_mode().unwrap(), mode);

        let list = FixedRecordList::new(
            Arc::clone(&pool),
            ListHeader::fixed(0, 256, 4),
            LeDecoder::<u32>::new(),
            &CacheConfig::lru(64).with_concurrency(4),
        )
        .unwrap();

        for index in (0..256).rev() {
            assert_eq!(*list.get(index).unwrap(), index * 3, "{mode}");
        }
        let walked: Vec<u32> = list
            .range(0, 256)
            .unwrap()
            .iter()
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(walked, values);
    }
}

#[test]
fn decode_failure_releases_reader_and_is_not_cached() {
    let file = write_u32_file(&[2, 3, 4]);
    let pool = Arc::new(ReaderPool::open(file.path(), AccessMode::Memory).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let decoder = EvenOnly {
        calls: Arc::clone(&calls),
    };
    let list = FixedRecordList::new(
        Arc::clone(&pool),
        ListHeader::fixed(0, 3, 4),
        decoder,
        &CacheConfig::switching(16),
    )
    .unwrap();

    for _ in 0..3 {
        assert!(matches!(list.get(1), Err(StorageError::Decode(_))));
    }
    assert_eq!(list.cache_size(), 0);
    assert_eq!(pool.stats().in_use, 0);
    assert_eq!(pool.stats().created, 1);

    assert_eq!(*list.get(2).unwrap(), 4);
    assert_eq!(list.cache_size(), 1);
    assert_eq!(calls.load(Ordering::Relaxed), 4);
}

#[test]
fn reset_cache_forces_redecode() {
    let file = write_u32_file(&[0, 2, 4, 6]);
    let pool = Arc::new(ReaderPool::open(file.path(), AccessMode::Mapped).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let list = FixedRecordList::new(
        pool,
        ListHeader::fixed(0, 4, 4),
        EvenOnly {
            calls: Arc::clone(&calls),
        },
        &CacheConfig::lru(16),
    )
    .unwrap();

    for index in 0..4 {
        list.get(index).unwrap();
        list.get(index).unwrap();
    }
    list.reset_cache();
    for index in 0..4 {
        list.get(index).unwrap();
    }

    assert_eq!(calls.load(Ordering::Relaxed), 8);
    let stats = list.cache_stats();
    assert_eq!(stats.requests, 4);
    assert_eq!(stats.misses, 4);
}

#[test]
fn pool_handles_track_concurrency_not_requests() {
    let values: Vec<u32> = (0..1_000).collect();
    let file = write_u32_file(&values);
    let pool = Arc::new(ReaderPool::open(file.path(), AccessMode::File).unwrap());
    let list = Arc::new(
        FixedRecordList::new(
            Arc::clone(&pool),
            ListHeader::fixed(0, 1_000, 4),
            LeDecoder::<u32>::new(),
            &CacheConfig::lru(128).with_concurrency(8),
        )
        .unwrap(),
    );

    let threads = 6;
    thread::scope(|scope| {
        for t in 0..threads {
            let list = Arc::clone(&list);
            scope.spawn(move || {
                for i in 0..2_000u32 {
                    let index = (i * 7 + t * 131) % 1_000;
                    assert_eq!(*list.get(index).unwrap(), index);
                }
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert!(stats.created >= 1);
    assert!(stats.created <= threads as usize, "created {}", stats.created);
    assert_eq!(stats.idle, stats.created);
}

#[test]
fn closed_pool_fails_loudly() {
    let file = write_u32_file(&[1, 2]);
    let pool = Arc::new(ReaderPool::open(file.path(), AccessMode::Mapped).unwrap());
    let list = FixedRecordList::new(
        Arc::clone(&pool),
        ListHeader::fixed(0, 2, 4),
        LeDecoder::<u32>::new(),
        &CacheConfig::lru(4),
    )
    .unwrap();

    pool.close();
    assert!(matches!(list.get(0), Err(StorageError::Closed)));
    assert!(matches!(
        list.range(0, 1).unwrap().iter(),
        Err(StorageError::Closed)
    ));
    assert_eq!(pool.stats().idle, 0);
}

#[test]
fn list_outside_source_is_rejected() {
    let file = write_u32_file(&[1, 2]);
    let pool = Arc::new(ReaderPool::open(file.path(), AccessMode::Memory).unwrap());
    let header = ListHeader {
        start_position: 4,
        length: 8,
        count: 0,
    };
    let result =
        VariableRecordList::new(pool, header, LeDecoder::<u8>::new(), &CacheConfig::lru(4));
    assert!(matches!(
        result,
        Err(StorageError::OutOfBounds { size: 8, .. })
    ));
}

#[test]
fn invalid_cache_config_fails_at_construction() {
    let file = write_u32_file(&[1]);
    let pool = Arc::new(ReaderPool::open(file.path(), AccessMode::Memory).unwrap());
    let result = FixedRecordList::new(
        pool,
        ListHeader::fixed(0, 1, 4),
        LeDecoder::<u32>::new(),
        &CacheConfig::lru(16).with_concurrency(0),
    );
    assert!(matches!(result, Err(StorageError::InvalidConfiguration(_))));
}
