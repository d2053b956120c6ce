//! Assemble dataset files from patterns or explicit trie edges

use crate::error::{TrieError, TrieResult};
use crate::header::DatasetHeader;
use crate::node::{ChildRecord, INLINE_LENGTH, NodeRecord, NumericRecord, compare_trailing};
use crate::strings::encode_string;
use binrw::BinWrite;
use sigmatch_storage::{ListHeader, StorageError};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Handle to a node added to a [`DatasetBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct BuildNode {
    position: i16,
    parent: Option<NodeId>,
    characters: Vec<u8>,
    complete: bool,
    children: Vec<(Vec<u8>, NodeId)>,
    numeric_children: Vec<(i16, NodeId)>,
}

/// In-memory dataset under construction
///
/// ```rust
/// use sigmatch_trie::{DatasetBuilder, DatasetConfig, TrieDataset};
///
/// let mut builder = DatasetBuilder::new();
/// builder.add_pattern(b"Mozi")?;
/// let dataset = TrieDataset::from_bytes(builder.build()?, &DatasetConfig::default())?;
///
/// let result = dataset.find_best(b"Mozilla")?;
/// assert_eq!(result.position(), Some(3));
/// # Ok::<(), sigmatch_trie::TrieError>(())
/// ```
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    nodes: Vec<BuildNode>,
    roots: Vec<NodeId>,
}

impl DatasetBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes added so far
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of roots added so far
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Add a root whose characters end at `position`
    pub fn add_root(&mut self, characters: &[u8], position: i16) -> TrieResult<NodeId> {
        if i32::from(position) + 1 < characters.len() as i32 {
            return Err(TrieError::Build(format!(
                "root of {} characters cannot end at position {position}",
                characters.len()
            )));
        }
        Self::check_string(characters)?;

        let id = self.push(BuildNode {
            position,
            parent: None,
            characters: characters.to_vec(),
            complete: false,
            children: Vec::new(),
            numeric_children: Vec::new(),
        });
        self.roots.push(id);
        Ok(id)
    }

    /// Add a string edge below `parent`, or return the existing one
    ///
    /// Every string edge under one node must have the same length.
    pub fn add_child(&mut self, parent: NodeId, characters: &[u8]) -> TrieResult<NodeId> {
        if characters.is_empty() || characters.len() > usize::from(u8::MAX) {
            return Err(TrieError::Build(format!(
                "child edge of {} characters",
                characters.len()
            )));
        }

        let parent_node = self.get(parent)?;
        if let Some((existing, _)) = parent_node.children.first()
            && existing.len() != characters.len()
        {
            return Err(TrieError::Build(format!(
                "child edge of {} characters under edges of {}",
                characters.len(),
                existing.len()
            )));
        }
        if let Some(&(_, id)) = parent_node
            .children
            .iter()
            .find(|(existing, _)| existing == characters)
        {
            return Ok(id);
        }

        let position = Self::advance(parent_node.position, characters.len())?;
        let id = self.push(BuildNode {
            position,
            parent: Some(parent),
            characters: characters.to_vec(),
            complete: false,
            children: Vec::new(),
            numeric_children: Vec::new(),
        });
        self.get_mut(parent)?.children.push((characters.to_vec(), id));
        Ok(id)
    }

    /// Add a numeric edge below `parent`, or return the existing one
    pub fn add_numeric_child(&mut self, parent: NodeId, value: i16) -> TrieResult<NodeId> {
        if value < 0 {
            return Err(TrieError::Build(format!("negative numeric edge {value}")));
        }

        let parent_node = self.get(parent)?;
        if let Some(&(_, id)) = parent_node
            .numeric_children
            .iter()
            .find(|(existing, _)| *existing == value)
        {
            return Ok(id);
        }

        let characters = value.to_string().into_bytes();
        let position = Self::advance(parent_node.position, characters.len())?;
        let id = self.push(BuildNode {
            position,
            parent: Some(parent),
            characters,
            complete: false,
            children: Vec::new(),
            numeric_children: Vec::new(),
        });
        self.get_mut(parent)?.numeric_children.push((value, id));
        Ok(id)
    }

    /// Flag `node` as terminating a pattern
    pub fn mark_complete(&mut self, node: NodeId) -> TrieResult<()> {
        self.get_mut(node)?.complete = true;
        Ok(())
    }

    /// Add a whole pattern starting at position 0
    ///
    /// Each byte becomes a one-byte string edge, except digit runs without
    /// a leading zero that fit an `i16`, which become numeric edges. Shared
    /// prefixes reuse existing nodes. Returns the completed node.
    pub fn add_pattern(&mut self, pattern: &[u8]) -> TrieResult<NodeId> {
        let Some((&first, rest)) = pattern.split_first() else {
            return Err(TrieError::Build("empty pattern".to_string()));
        };

        let mut current = match self
            .roots
            .iter()
            .copied()
            .find(|&id| self.nodes[id.0].position == 0 && self.nodes[id.0].characters == [first])
        {
            Some(id) => id,
            None => self.add_root(&[first], 0)?,
        };

        let mut index = 0;
        while index < rest.len() {
            let run = rest[index..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let numeric = (run > 0 && (rest[index] != b'0' || run == 1))
                .then(|| std::str::from_utf8(&rest[index..index + run]).ok())
                .flatten()
                .and_then(|digits| digits.parse::<i16>().ok());

            if let Some(value) = numeric {
                current = self.add_numeric_child(current, value)?;
                index += run;
            } else {
                current = self.add_child(current, &rest[index..=index])?;
                index += 1;
            }
        }

        self.mark_complete(current)?;
        Ok(current)
    }

    /// Encode the dataset
    pub fn build(&self) -> TrieResult<Vec<u8>> {
        // Strings: every node's characters plus child edges too long to inline
        let mut strings = Vec::new();
        let mut string_offsets: HashMap<&[u8], u32> = HashMap::new();
        let mut node_strings = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            node_strings.push(Self::intern(
                &node.characters,
                &mut strings,
                &mut string_offsets,
            )?);
        }

        // Node offsets depend only on child counts
        let mut node_offsets = Vec::with_capacity(self.nodes.len());
        let mut nodes_length = 0usize;
        for node in &self.nodes {
            node_offsets.push(Self::to_u32(nodes_length, "nodes list")?);
            nodes_length +=
                NodeRecord::encoded_len(node.children.len(), node.numeric_children.len());
        }

        let mut nodes = Cursor::new(Vec::with_capacity(nodes_length));
        for (index, node) in self.nodes.iter().enumerate() {
            let mut children: Vec<&(Vec<u8>, NodeId)> = node.children.iter().collect();
            children.sort_by(|(a, _), (b, _)| compare_trailing(b, a));
            let mut numeric_children = node.numeric_children.clone();
            numeric_children.sort_by_key(|&(value, _)| value);

            let mut child_records = Vec::with_capacity(children.len());
            for (characters, id) in children {
                let mut value = [0u8; INLINE_LENGTH];
                let is_string = characters.len() > INLINE_LENGTH;
                if is_string {
                    value = Self::intern(characters, &mut strings, &mut string_offsets)?
                        .to_le_bytes();
                } else {
                    value[..characters.len()].copy_from_slice(characters);
                }
                child_records.push(ChildRecord {
                    is_string,
                    length: characters.len() as u8,
                    value,
                    related_offset: node_offsets[id.0],
                });
            }

            let record = NodeRecord {
                position: node.position,
                parent_offset: node
                    .parent
                    .map_or(Ok(-1), |parent| i32::try_from(node_offsets[parent.0]))
                    .map_err(|_| TrieError::Build("nodes list exceeds 2 GiB".to_string()))?,
                character_string_offset: i32::try_from(node_strings[index])
                    .map_err(|_| TrieError::Build("strings list exceeds 2 GiB".to_string()))?,
                complete: node.complete,
                children: child_records,
                numeric_children: numeric_children
                    .iter()
                    .map(|&(value, id)| NumericRecord {
                        value,
                        related_offset: node_offsets[id.0],
                    })
                    .collect(),
            };
            record
                .write(&mut nodes)
                .map_err(|e| TrieError::Build(format!("encoding node {index}: {e}")))?;
        }
        let nodes = nodes.into_inner();

        let mut roots = Vec::with_capacity(self.roots.len() * 4);
        for id in &self.roots {
            roots.extend_from_slice(&node_offsets[id.0].to_le_bytes());
        }

        let strings_start = DatasetHeader::SIZE;
        let nodes_start = strings_start + strings.len();
        let roots_start = nodes_start + nodes.len();
        let header = DatasetHeader::new(
            ListHeader {
                start_position: Self::to_u32(strings_start, "strings list")?,
                length: Self::to_u32(strings.len(), "strings list")?,
                count: Self::to_u32(string_offsets.len(), "strings list")?,
            },
            ListHeader {
                start_position: Self::to_u32(nodes_start, "nodes list")?,
                length: Self::to_u32(nodes.len(), "nodes list")?,
                count: Self::to_u32(self.nodes.len(), "nodes list")?,
            },
            ListHeader::fixed(
                Self::to_u32(roots_start, "roots list")?,
                Self::to_u32(self.roots.len(), "roots list")?,
                4,
            ),
        );

        let mut out = Cursor::new(Vec::with_capacity(roots_start + roots.len()));
        header
            .write(&mut out)
            .map_err(|e| TrieError::Build(format!("encoding header: {e}")))?;
        let mut out = out.into_inner();
        out.extend_from_slice(&strings);
        out.extend_from_slice(&nodes);
        out.extend_from_slice(&roots);

        debug!(
            "Built dataset: {} nodes, {} roots, {} strings, {} bytes",
            self.nodes.len(),
            self.roots.len(),
            string_offsets.len(),
            out.len()
        );
        Ok(out)
    }

    /// Encode the dataset and write it to `path`
    pub fn write_to(&self, path: impl AsRef<Path>) -> TrieResult<()> {
        let bytes = self.build()?;
        std::fs::write(path, bytes).map_err(StorageError::from)?;
        Ok(())
    }

    fn intern<'a>(
        bytes: &'a [u8],
        strings: &mut Vec<u8>,
        offsets: &mut HashMap<&'a [u8], u32>,
    ) -> TrieResult<u32> {
        Self::check_string(bytes)?;
        if let Some(&offset) = offsets.get(bytes) {
            return Ok(offset);
        }
        let offset = Self::to_u32(strings.len(), "strings list")?;
        encode_string(bytes, strings);
        offsets.insert(bytes, offset);
        Ok(offset)
    }

    fn push(&mut self, node: BuildNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn get(&self, id: NodeId) -> TrieResult<&BuildNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| TrieError::Build(format!("unknown node {}", id.0)))
    }

    fn get_mut(&mut self, id: NodeId) -> TrieResult<&mut BuildNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| TrieError::Build(format!("unknown node {}", id.0)))
    }

    fn advance(position: i16, length: usize) -> TrieResult<i16> {
        i16::try_from(length)
            .ok()
            .and_then(|length| position.checked_add(length))
            .ok_or_else(|| TrieError::Build(format!("position overflow after {position}")))
    }

    fn check_string(bytes: &[u8]) -> TrieResult<()> {
        if bytes.len() > usize::from(u16::MAX) {
            return Err(TrieError::Build(format!(
                "string of {} bytes exceeds the 65535 byte limit",
                bytes.len()
            )));
        }
        Ok(())
    }

    fn to_u32(value: usize, what: &str) -> TrieResult<u32> {
        u32::try_from(value).map_err(|_| TrieError::Build(format!("{what} exceeds 4 GiB")))
    }
}
