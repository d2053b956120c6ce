//! Error types for storage operations

use sigmatch_cache::CacheError;
use std::io;
use thiserror::Error;

/// Errors that can occur while reading records from a data source
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading the backing source failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Bytes were read but do not form the expected record
    #[error("Decode error: {0}")]
    Decode(String),

    /// A read extends past the end of the source
    #[error("Read beyond source bounds: offset={offset}, length={length}, size={size}")]
    OutOfBounds {
        /// Requested offset
        offset: u64,
        /// Requested length
        length: u64,
        /// Source size
        size: u64,
    },

    /// An index or offset lies outside its list
    #[error("Key {key} out of range for list of {limit}")]
    KeyOutOfRange {
        /// Requested index or byte offset
        key: u32,
        /// Record count or byte length of the list
        limit: u32,
    },

    /// The pool or dataset has been closed
    #[error("Data source is closed")]
    Closed,

    /// Cache construction failed
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] CacheError),
}

impl From<binrw::Error> for StorageError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io) => Self::Io(io),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
