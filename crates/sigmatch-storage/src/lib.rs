//! On-demand record storage over one read-only data source
//!
//! A dataset file is opened once as a [`DataSource`] (memory-mapped, read
//! into memory, or read through per-handle file descriptors). A
//! [`ReaderPool`] hands out exclusive [`SourceReader`] handles to whichever
//! thread needs one, and the record lists decode records through those
//! handles only when a record is first requested:
//!
//! - [`FixedRecordList`]: records of one size, addressed by index
//! - [`VariableRecordList`]: records addressed by byte offset
//!
//! Both lists sit behind a [`sigmatch_cache::Cache`].
//!
//! # Example
//!
//! ```rust
//! use sigmatch_cache::CacheConfig;
//! use sigmatch_storage::{DataSource, FixedRecordList, LeDecoder, ListHeader, ReaderPool};
//! use std::sync::Arc;
//!
//! let data: Vec<u8> = [7u32, 11, 13].iter().flat_map(|v| v.to_le_bytes()).collect();
//! let pool = Arc::new(ReaderPool::new(DataSource::from_bytes(data)));
//! let list = FixedRecordList::new(
//!     pool,
//!     ListHeader::fixed(0, 3, 4),
//!     LeDecoder::<u32>::new(),
//!     &CacheConfig::lru(64),
//! )?;
//!
//! assert_eq!(*list.get(1)?, 11);
//! # Ok::<(), sigmatch_storage::StorageError>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod header;
pub mod list;
pub mod pool;
pub mod record;
pub mod source;

pub use error::{StorageError, StorageResult};
pub use header::ListHeader;
pub use list::{FixedRecordList, RangeIter, RecordRange, VariableIter, VariableRecordList};
pub use pool::{PoolStats, PooledReader, ReaderPool};
pub use record::{FixedRecordDecoder, LeDecoder, RecordDecoder};
pub use source::{AccessMode, DataSource, SourceReader};
