//! Error types for dataset access and matching

use sigmatch_storage::StorageError;
use thiserror::Error;

/// Errors raised while opening, building or matching against a dataset
#[derive(Error, Debug)]
pub enum TrieError {
    /// Reading or decoding a record failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The file does not start with the dataset magic
    #[error("Invalid dataset magic: {0:02x?}")]
    InvalidMagic([u8; 4]),

    /// The dataset header is truncated or inconsistent
    #[error("Invalid dataset header: {0}")]
    Header(String),

    /// The dataset was written by an incompatible version
    #[error("Unsupported dataset version: {0}")]
    UnsupportedVersion(u16),

    /// The node graph is structurally invalid
    #[error("Corrupt dataset: {0}")]
    Corrupt(String),

    /// Builder input cannot form a valid dataset
    #[error("Build error: {0}")]
    Build(String),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sigmatch_cache::CacheError> for TrieError {
    fn from(err: sigmatch_cache::CacheError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TrieError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl TrieError {
    /// Whether the error comes from using a closed dataset
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Closed))
    }
}

/// Result type for trie operations
pub type TrieResult<T> = std::result::Result<T, TrieError>;
