//! Error types for cache construction

use thiserror::Error;

/// Errors that can occur while building a cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),

    /// The background generation worker could not be started
    #[error("Failed to start background worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
