//! Dataset file header

use crate::error::{TrieError, TrieResult};
use binrw::{BinRead, BinWrite};
use serde::Serialize;
use sigmatch_storage::{ListHeader, SourceReader};

/// Magic bytes at the start of every dataset file
pub const MAGIC: [u8; 4] = *b"SGTR";

/// Dataset format version written by this crate
pub const VERSION: u16 = 1;

/// Dataset header (44 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite, Serialize)]
#[brw(little)]
pub struct DatasetHeader {
    /// Magic bytes: 'SGTR'
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Reserved, written as 0
    pub reserved: u16,
    /// Length-prefixed byte strings
    pub strings: ListHeader,
    /// Trie node records
    pub nodes: ListHeader,
    /// Root node offsets
    pub roots: ListHeader,
}

impl DatasetHeader {
    /// Encoded size in bytes
    pub const SIZE: usize = 8 + 3 * ListHeader::SIZE;

    /// Header for the current version
    pub const fn new(strings: ListHeader, nodes: ListHeader, roots: ListHeader) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            reserved: 0,
            strings,
            nodes,
            roots,
        }
    }

    /// Read and validate the header at the start of the source
    pub fn read_from(reader: &mut SourceReader) -> TrieResult<Self> {
        let source_len = reader.len();
        if source_len < Self::SIZE as u64 {
            return Err(TrieError::Header(format!(
                "file is {source_len} bytes, header needs {}",
                Self::SIZE
            )));
        }

        reader.seek_to(0)?;
        let header: Self = reader.read_le()?;
        header.validate(source_len)?;
        Ok(header)
    }

    /// Check magic, version, and that every list lies inside the source
    pub fn validate(&self, source_len: u64) -> TrieResult<()> {
        if self.magic != MAGIC {
            return Err(TrieError::InvalidMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(TrieError::UnsupportedVersion(self.version));
        }

        for (name, list) in [
            ("strings", &self.strings),
            ("nodes", &self.nodes),
            ("roots", &self.roots),
        ] {
            if u64::from(list.start_position) < Self::SIZE as u64 && list.length > 0 {
                return Err(TrieError::Header(format!(
                    "{name} list overlaps the header"
                )));
            }
            list.validate(source_len)
                .map_err(|e| TrieError::Header(format!("{name} list: {e}")))?;
        }

        if u64::from(self.roots.count) * 4 > u64::from(self.roots.length) {
            return Err(TrieError::Header(format!(
                "roots list holds {} bytes, {} offsets declared",
                self.roots.length, self.roots.count
            )));
        }
        Ok(())
    }
}
