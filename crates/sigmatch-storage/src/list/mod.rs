//! Lazily decoded record lists fronted by a cache
//!
//! Records are decoded from the backing source on the first request and
//! then served from the list's cache until evicted. A failed decode is
//! returned to the caller and never cached.

mod fixed;
mod variable;

pub use fixed::{FixedRecordList, RangeIter, RecordRange};
pub use variable::{VariableIter, VariableRecordList};

use crate::error::StorageResult;
use crate::pool::ReaderPool;
use crate::record::RecordDecoder;
use std::sync::Arc;

/// Check out a reader, seek to `offset` and decode one record
///
/// The reader guard is dropped on every path, so a decode error still
/// returns the handle to the pool.
fn load_record<D: RecordDecoder>(
    pool: &ReaderPool,
    decoder: &D,
    key: u32,
    offset: u64,
) -> StorageResult<Arc<D::Record>> {
    let mut reader = pool.checkout()?;
    reader.seek_to(offset)?;
    decoder.decode(&mut reader, key).map(Arc::new)
}
