//! Trie node records
//!
//! Nodes refer to their parent and children by byte offset into the nodes
//! list. Nothing is owned across nodes; every hop is a lookup through the
//! dataset, which resolves it from the cache or decodes it on demand.
//!
//! Record layout (little-endian):
//!
//! ```text
//! position i16 | parent_offset i32 | character_string_offset i32 | complete u8
//! child_count u16 | numeric_child_count u16
//! child_count × (is_string u8 | length u8 | value [u8; 4] | related_offset u32)
//! numeric_child_count × (value i16 | related_offset u32)
//! ```

use crate::dataset::TrieDataset;
use crate::error::{TrieError, TrieResult};
use binrw::{BinRead, BinWrite, binrw};
use sigmatch_storage::{RecordDecoder, SourceReader, StorageError, StorageResult};
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

/// Longest child value stored inline in its entry
pub const INLINE_LENGTH: usize = 4;

/// Offset value meaning "none" in parent and string references
const NO_OFFSET: i32 = -1;

/// On-disk node record
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Index of the last target byte the node covers
    pub position: i16,
    /// Offset of the parent node, -1 for roots
    pub parent_offset: i32,
    /// Offset of the node's characters in the strings list, -1 when absent
    pub character_string_offset: i32,
    /// Whether the node terminates a pattern
    #[br(map = |v: u8| v != 0)]
    #[bw(map = |v: &bool| u8::from(*v))]
    pub complete: bool,
    #[br(temp)]
    #[bw(try_calc(u16::try_from(children.len())))]
    child_count: u16,
    #[br(temp)]
    #[bw(try_calc(u16::try_from(numeric_children.len())))]
    numeric_child_count: u16,
    /// String children
    #[br(count = child_count)]
    pub children: Vec<ChildRecord>,
    /// Numeric children
    #[br(count = numeric_child_count)]
    pub numeric_children: Vec<NumericRecord>,
}

impl NodeRecord {
    /// Encoded size of a record with the given child counts
    pub const fn encoded_len(children: usize, numeric_children: usize) -> usize {
        15 + children * 10 + numeric_children * 6
    }
}

/// On-disk string child entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ChildRecord {
    /// `value` holds a string offset rather than inline bytes
    #[br(map = |v: u8| v != 0)]
    #[bw(map = |v: &bool| u8::from(*v))]
    pub is_string: bool,
    /// Number of characters
    pub length: u8,
    /// Inline characters, or a little-endian strings list offset
    pub value: [u8; 4],
    /// Offset of the child node
    pub related_offset: u32,
}

/// On-disk numeric child entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct NumericRecord {
    /// Numeric value of the edge
    pub value: i16,
    /// Offset of the child node
    pub related_offset: u32,
}

/// Compare equal-length byte strings starting from the trailing byte
///
/// String children are sorted descending by this order.
pub fn compare_trailing(a: &[u8], b: &[u8]) -> Ordering {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .map(|(x, y)| x.cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

#[derive(Debug)]
enum ChildValue {
    Inline([u8; INLINE_LENGTH]),
    Pooled(u32),
}

/// A string edge to a child node
#[derive(Debug)]
pub struct ChildEntry {
    length: u8,
    value: ChildValue,
    related_offset: u32,
    resolved: OnceLock<Arc<Vec<u8>>>,
}

impl ChildEntry {
    /// Number of characters on the edge
    pub const fn len(&self) -> usize {
        self.length as usize
    }

    /// Whether the edge has no characters
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Offset of the child node
    pub const fn related_offset(&self) -> u32 {
        self.related_offset
    }

    /// Edge characters, resolved from the strings list on first use
    pub fn characters(&self, dataset: &TrieDataset) -> TrieResult<&[u8]> {
        match &self.value {
            ChildValue::Inline(bytes) => Ok(&bytes[..self.len()]),
            ChildValue::Pooled(offset) => {
                if let Some(characters) = self.resolved.get() {
                    return Ok(characters.as_slice());
                }
                let loaded = dataset.string(*offset)?;
                if loaded.len() != self.len() {
                    return Err(TrieError::Corrupt(format!(
                        "child string at {offset} is {} bytes, entry says {}",
                        loaded.len(),
                        self.length
                    )));
                }
                Ok(self.resolved.get_or_init(|| loaded).as_slice())
            }
        }
    }
}

/// A numeric edge to a child node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericChild {
    /// Numeric value of the edge
    pub value: i16,
    /// Offset of the child node
    pub related_offset: u32,
}

/// A decoded trie node
#[derive(Debug)]
pub struct Node {
    offset: u32,
    position: i16,
    parent_offset: Option<u32>,
    characters_offset: Option<u32>,
    characters: OnceLock<Arc<Vec<u8>>>,
    complete: bool,
    children: Vec<ChildEntry>,
    numeric_children: Vec<NumericChild>,
}

impl Node {
    /// Build a node from its record, checking the invariants the matcher
    /// relies on
    pub fn from_record(offset: u32, record: NodeRecord) -> StorageResult<Self> {
        let invalid = |message: String| StorageError::Decode(format!("node {offset}: {message}"));

        if record.position < -1 {
            return Err(invalid(format!("position {}", record.position)));
        }

        let optional_offset = |value: i32, field: &str| match value {
            NO_OFFSET => Ok(None),
            v => u32::try_from(v)
                .map(Some)
                .map_err(|_| invalid(format!("{field} {v}"))),
        };
        let parent_offset = optional_offset(record.parent_offset, "parent offset")?;
        let characters_offset = optional_offset(record.character_string_offset, "string offset")?;

        let edge_length = record.children.first().map(|child| child.length);
        let mut children = Vec::with_capacity(record.children.len());
        for child in record.children {
            if Some(child.length) != edge_length || child.length == 0 {
                return Err(invalid(format!(
                    "child edge of length {} under edges of length {}",
                    child.length,
                    edge_length.unwrap_or_default()
                )));
            }
            let value = if child.is_string {
                ChildValue::Pooled(u32::from_le_bytes(child.value))
            } else if usize::from(child.length) <= INLINE_LENGTH {
                ChildValue::Inline(child.value)
            } else {
                return Err(invalid(format!(
                    "inline child of length {}",
                    child.length
                )));
            };
            children.push(ChildEntry {
                length: child.length,
                value,
                related_offset: child.related_offset,
                resolved: OnceLock::new(),
            });
        }

        let mut numeric_children: Vec<NumericChild> = record
            .numeric_children
            .iter()
            .map(|n| NumericChild {
                value: n.value,
                related_offset: n.related_offset,
            })
            .collect();
        if !numeric_children.is_sorted_by_key(|n| n.value) {
            numeric_children.sort_by_key(|n| n.value);
        }

        Ok(Self {
            offset,
            position: record.position,
            parent_offset,
            characters_offset,
            characters: OnceLock::new(),
            complete: record.complete,
            children,
            numeric_children,
        })
    }

    /// Offset of this node in the nodes list
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Index of the last target byte the node covers
    pub const fn position(&self) -> i16 {
        self.position
    }

    /// Offset of the parent node
    pub const fn parent_offset(&self) -> Option<u32> {
        self.parent_offset
    }

    /// Whether the node terminates a known pattern
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// String edges, sorted descending by [`compare_trailing`]
    pub fn children(&self) -> &[ChildEntry] {
        &self.children
    }

    /// Numeric edges, sorted ascending by value
    pub fn numeric_children(&self) -> &[NumericChild] {
        &self.numeric_children
    }

    /// Whether the node has numeric edges
    pub fn has_numeric_children(&self) -> bool {
        !self.numeric_children.is_empty()
    }

    /// Index of the first target byte below this node
    pub fn next_index(&self) -> usize {
        usize::try_from(i32::from(self.position) + 1).unwrap_or_default()
    }

    /// The node's own characters, ending at [`position`](Self::position)
    pub fn characters(&self, dataset: &TrieDataset) -> TrieResult<Option<&[u8]>> {
        let Some(offset) = self.characters_offset else {
            return Ok(None);
        };
        if let Some(characters) = self.characters.get() {
            return Ok(Some(characters.as_slice()));
        }
        let loaded = dataset.string(offset)?;
        Ok(Some(self.characters.get_or_init(|| loaded).as_slice()))
    }

    /// The parent node, resolved through the dataset
    pub fn parent(&self, dataset: &TrieDataset) -> TrieResult<Option<Arc<Self>>> {
        self.parent_offset
            .map(|offset| dataset.node(offset))
            .transpose()
    }

    /// Whether the node's characters appear in `target` ending at its position
    pub fn matches_target(&self, target: &[u8], dataset: &TrieDataset) -> TrieResult<bool> {
        let characters = self.characters(dataset)?.unwrap_or_default();
        let end = self.next_index();
        Ok(end >= characters.len()
            && target
                .get(end - characters.len()..end)
                .is_some_and(|window| window == characters))
    }

    /// Binary search the string edges for the one matching `target` below
    /// this node
    pub fn find_child(
        &self,
        target: &[u8],
        dataset: &TrieDataset,
    ) -> TrieResult<Option<&ChildEntry>> {
        let Some(first) = self.children.first() else {
            return Ok(None);
        };
        let start = self.next_index();
        let Some(window) = target.get(start..start + first.len()) else {
            return Ok(None);
        };

        let (mut low, mut high) = (0, self.children.len());
        while low < high {
            let mid = low + (high - low) / 2;
            let child = &self.children[mid];
            match compare_trailing(window, child.characters(dataset)?) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok(Some(child)),
            }
        }
        Ok(None)
    }
}

/// Decodes [`Node`]s from the nodes list
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeDecoder;

impl RecordDecoder for NodeDecoder {
    type Record = Node;

    fn decode(&self, reader: &mut SourceReader, key: u32) -> StorageResult<Node> {
        let record: NodeRecord = reader.read_le()?;
        Node::from_record(key, record)
    }
}
