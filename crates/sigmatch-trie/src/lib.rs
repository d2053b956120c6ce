//! Signature matching over a position-indexed substring trie
//!
//! A dataset file holds trie nodes, the byte strings they reference and a
//! list of root nodes. [`TrieDataset`] opens the file through a shared
//! reader pool and decodes nodes only as the [`Matcher`] reaches them, so a
//! large dataset can be matched against without loading it whole.
//!
//! For a target such as a client signature, [`Matcher::find_best`] returns
//! the most specific complete node: exact byte edges are preferred, and digit
//! runs fall back to the numerically nearest edge, with the difference
//! reported as a score.
//!
//! ```rust
//! use sigmatch_trie::{DatasetBuilder, DatasetConfig, TrieDataset};
//!
//! let mut builder = DatasetBuilder::new();
//! builder.add_pattern(b"Chrome/120")?;
//! builder.add_pattern(b"Chrome/96")?;
//!
//! let dataset = TrieDataset::from_bytes(builder.build()?, &DatasetConfig::default())?;
//! let result = dataset.find_best(b"Chrome/119 Safari")?;
//!
//! assert!(result.is_match());
//! assert_eq!(result.lowest_score, 1);
//! assert_eq!(dataset.matcher().describe(&result, b"Chrome/119")?, "Chrome/120");
//! # Ok::<(), sigmatch_trie::TrieError>(())
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod header;
pub mod matcher;
pub mod node;
pub mod numeric;
pub mod strings;

pub use builder::{DatasetBuilder, NodeId};
pub use config::DatasetConfig;
pub use dataset::{DatasetStats, TrieDataset};
pub use error::{TrieError, TrieResult};
pub use header::DatasetHeader;
pub use matcher::{MatchResult, Matcher, NodeEvaluation, Visit};
pub use node::{Node, NodeDecoder};
pub use strings::StringDecoder;

pub use sigmatch_cache::{CacheConfig, CacheStrategy};
pub use sigmatch_storage::AccessMode;
