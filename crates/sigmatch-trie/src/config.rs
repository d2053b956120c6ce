//! Configuration for opening a dataset

use crate::error::{TrieError, TrieResult};
use serde::{Deserialize, Serialize};
use sigmatch_cache::{CacheConfig, CacheStrategy, DEFAULT_CAPACITY};
use sigmatch_storage::AccessMode;
use std::path::Path;

/// Default capacity of the root offset cache
pub const DEFAULT_ROOT_CAPACITY: usize = 1_000;

/// How a dataset is accessed and cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// How the dataset file is read
    pub access: AccessMode,
    /// Cache in front of the strings list
    pub strings: CacheConfig,
    /// Cache in front of the nodes list
    pub nodes: CacheConfig,
    /// Cache in front of the roots list
    pub roots: CacheConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            access: AccessMode::Mapped,
            strings: CacheConfig::lru(DEFAULT_CAPACITY),
            nodes: CacheConfig::lru(DEFAULT_CAPACITY),
            roots: CacheConfig::lru(DEFAULT_ROOT_CAPACITY),
        }
    }
}

impl DatasetConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> TrieResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> TrieResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TrieError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Set the access mode
    #[must_use]
    pub const fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    /// Use `strategy` for every list cache
    #[must_use]
    pub const fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strings.strategy = strategy;
        self.nodes.strategy = strategy;
        self.roots.strategy = strategy;
        self
    }

    /// Set the strings cache
    #[must_use]
    pub fn with_strings(mut self, cache: CacheConfig) -> Self {
        self.strings = cache;
        self
    }

    /// Set the nodes cache
    #[must_use]
    pub fn with_nodes(mut self, cache: CacheConfig) -> Self {
        self.nodes = cache;
        self
    }

    /// Set the roots cache
    #[must_use]
    pub fn with_roots(mut self, cache: CacheConfig) -> Self {
        self.roots = cache;
        self
    }

    /// Validate every nested cache configuration
    pub fn validate(&self) -> TrieResult<()> {
        for (name, cache) in [
            ("strings", &self.strings),
            ("nodes", &self.nodes),
            ("roots", &self.roots),
        ] {
            cache
                .validate()
                .map_err(|e| TrieError::Config(format!("{name} cache: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = DatasetConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.access, AccessMode::Mapped);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = DatasetConfig::from_json(
            r#"{ "access": "file", "nodes": { "strategy": "switching", "capacity": 64 } }"#,
        )
        .unwrap();

        assert_eq!(config.access, AccessMode::File);
        assert_eq!(config.nodes.strategy, CacheStrategy::Switching);
        assert_eq!(config.nodes.capacity, 64);
        assert_eq!(config.strings, DatasetConfig::default().strings);
    }

    #[test]
    fn test_invalid_nested_cache_is_rejected() {
        let result = DatasetConfig::from_json(r#"{ "roots": { "capacity": 0 } }"#);
        assert!(matches!(result, Err(TrieError::Config(ref m)) if m.starts_with("roots cache")));

        let result = DatasetConfig::from_json(r#"{ "access": "tape" }"#);
        assert!(matches!(result, Err(TrieError::Config(_))));
    }

    #[test]
    fn test_strategy_applies_to_all_lists() {
        let config = DatasetConfig::new().with_strategy(CacheStrategy::Switching);
        assert_eq!(config.strings.strategy, CacheStrategy::Switching);
        assert_eq!(config.nodes.strategy, CacheStrategy::Switching);
        assert_eq!(config.roots.strategy, CacheStrategy::Switching);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "access": "memory" }}"#).unwrap();
        let config = DatasetConfig::from_file(file.path()).unwrap();
        assert_eq!(config.access, AccessMode::Memory);

        assert!(DatasetConfig::from_file("/nonexistent/sigmatch.json").is_err());
    }
}
