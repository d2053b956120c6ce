//! An opened dataset: one reader pool shared by three lazily loaded lists

use crate::config::DatasetConfig;
use crate::error::{TrieError, TrieResult};
use crate::header::DatasetHeader;
use crate::matcher::{MatchResult, Matcher};
use crate::node::{Node, NodeDecoder};
use crate::strings::StringDecoder;
use bytes::Bytes;
use serde::Serialize;
use sigmatch_cache::CacheStats;
use sigmatch_storage::{
    AccessMode, DataSource, FixedRecordList, LeDecoder, PoolStats, ReaderPool, StorageError,
    VariableRecordList,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Cache and pool statistics for an open dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    /// Strings list cache
    pub strings: CacheStats,
    /// Nodes list cache
    pub nodes: CacheStats,
    /// Roots list cache
    pub roots: CacheStats,
    /// Reader pool
    pub pool: PoolStats,
}

/// A trie dataset read on demand
pub struct TrieDataset {
    header: DatasetHeader,
    pool: Arc<ReaderPool>,
    strings: VariableRecordList<StringDecoder>,
    nodes: VariableRecordList<NodeDecoder>,
    roots: FixedRecordList<LeDecoder<u32>>,
    closed: AtomicBool,
}

impl TrieDataset {
    /// Open a dataset file
    pub fn open(path: impl AsRef<Path>, config: &DatasetConfig) -> TrieResult<Self> {
        let path = path.as_ref();
        config.validate()?;
        let pool = ReaderPool::open(path, config.access)?;
        let dataset = Self::with_pool(pool, config)?;
        debug!(
            "Opened dataset {} ({} access, {} nodes, {} roots)",
            path.display(),
            config.access,
            dataset.header.nodes.count,
            dataset.header.roots.count
        );
        Ok(dataset)
    }

    /// Open a dataset held in memory; `config.access` is ignored
    pub fn from_bytes(data: impl Into<Bytes>, config: &DatasetConfig) -> TrieResult<Self> {
        config.validate()?;
        Self::with_pool(ReaderPool::new(DataSource::from_bytes(data)), config)
    }

    fn with_pool(pool: ReaderPool, config: &DatasetConfig) -> TrieResult<Self> {
        let header = {
            let mut reader = pool.checkout()?;
            DatasetHeader::read_from(&mut reader)?
        };

        let pool = Arc::new(pool);
        let strings = VariableRecordList::new(
            Arc::clone(&pool),
            header.strings,
            StringDecoder,
            &config.strings,
        )?;
        let nodes =
            VariableRecordList::new(Arc::clone(&pool), header.nodes, NodeDecoder, &config.nodes)?;
        let roots = FixedRecordList::new(
            Arc::clone(&pool),
            header.roots,
            LeDecoder::<u32>::new(),
            &config.roots,
        )?;

        Ok(Self {
            header,
            pool,
            strings,
            nodes,
            roots,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> TrieResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TrieError::Storage(StorageError::Closed));
        }
        Ok(())
    }

    /// File header
    pub const fn header(&self) -> &DatasetHeader {
        &self.header
    }

    /// How the backing file is accessed
    pub fn access_mode(&self) -> TrieResult<AccessMode> {
        self.ensure_open()?;
        Ok(self.pool.access_mode()?)
    }

    /// Node at `offset` in the nodes list
    pub fn node(&self, offset: u32) -> TrieResult<Arc<Node>> {
        self.ensure_open()?;
        Ok(self.nodes.get(offset)?)
    }

    /// String at `offset` in the strings list
    pub fn string(&self, offset: u32) -> TrieResult<Arc<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.strings.get(offset)?)
    }

    /// Number of root nodes
    pub const fn root_count(&self) -> u32 {
        self.header.roots.count
    }

    /// Offset of the root node at `index`
    pub fn root_offset(&self, index: u32) -> TrieResult<u32> {
        self.ensure_open()?;
        Ok(*self.roots.get(index)?)
    }

    /// Root node at `index`
    pub fn root(&self, index: u32) -> TrieResult<Arc<Node>> {
        let offset = self.root_offset(index)?;
        self.node(offset)
    }

    /// The nodes list, for sequential walks
    pub fn nodes(&self) -> TrieResult<&VariableRecordList<NodeDecoder>> {
        self.ensure_open()?;
        Ok(&self.nodes)
    }

    /// Matcher over this dataset
    pub const fn matcher(&self) -> Matcher<'_> {
        Matcher::new(self)
    }

    /// Shorthand for `self.matcher().find_best(target)`
    pub fn find_best(&self, target: &[u8]) -> TrieResult<MatchResult> {
        self.matcher().find_best(target)
    }

    /// Cache and pool statistics
    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            strings: self.strings.cache_stats(),
            nodes: self.nodes.cache_stats(),
            roots: self.roots.cache_stats(),
            pool: self.pool.stats(),
        }
    }

    /// Drop every cached record
    pub fn reset_caches(&self) {
        self.strings.reset_cache();
        self.nodes.reset_cache();
        self.roots.reset_cache();
    }

    /// Release the caches and the backing source
    ///
    /// Every accessor fails with [`StorageError::Closed`] afterwards.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.reset_caches();
        self.pool.close();
        debug!("Closed dataset");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for TrieDataset {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TrieDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrieDataset")
            .field("header", &self.header)
            .field("closed", &self.is_closed())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
