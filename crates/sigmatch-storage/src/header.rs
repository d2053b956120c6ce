//! Location and size of one record list inside a data source

use crate::error::{StorageError, StorageResult};
use binrw::{BinRead, BinWrite};
use serde::{Deserialize, Serialize};

/// Record list header (12 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite, Serialize, Deserialize)]
#[brw(little)]
pub struct ListHeader {
    /// Byte offset of the first record
    pub start_position: u32,
    /// Total size of the list in bytes
    pub length: u32,
    /// Number of records
    pub count: u32,
}

impl ListHeader {
    /// Encoded size in bytes
    pub const SIZE: usize = 12;

    /// Header for `count` fixed-length records starting at `start_position`
    pub const fn fixed(start_position: u32, count: u32, record_length: u32) -> Self {
        Self {
            start_position,
            length: count.saturating_mul(record_length),
            count,
        }
    }

    /// Offset one past the last byte of the list
    pub const fn end(&self) -> u64 {
        self.start_position as u64 + self.length as u64
    }

    /// Check that the list lies within a source of `source_len` bytes
    pub fn validate(&self, source_len: u64) -> StorageResult<()> {
        if self.end() > source_len {
            return Err(StorageError::OutOfBounds {
                offset: u64::from(self.start_position),
                length: u64::from(self.length),
                size: source_len,
            });
        }
        Ok(())
    }
}
