//! Read-only backing data sources and their reader handles
//!
//! A [`DataSource`] is opened once per dataset. Mapped and in-memory sources
//! share one [`Bytes`] buffer between every reader; file sources give each
//! reader its own buffered file handle.

use crate::error::{StorageError, StorageResult};
use binrw::{BinRead, Endian};
use bytes::Bytes;
use memmap2::MmapOptions;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a dataset file is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Memory-map the file
    #[default]
    Mapped,
    /// Open a buffered file handle per reader
    File,
    /// Read the whole file into memory
    Memory,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mapped => write!(f, "mapped"),
            Self::File => write!(f, "file"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mapped" | "mmap" => Ok(Self::Mapped),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown access mode '{other}'")),
        }
    }
}

enum Backing {
    Shared(Bytes),
    File(PathBuf),
}

/// One read-only data source shared by every reader handle
pub struct DataSource {
    backing: Backing,
    len: u64,
    mode: AccessMode,
}

impl DataSource {
    /// Open a file with the given access mode
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> StorageResult<Self> {
        let path = path.as_ref();

        let (backing, len) = match mode {
            AccessMode::Mapped => {
                let file = File::open(path)?;
                let len = file.metadata()?.len();
                let data = if len == 0 {
                    Bytes::new()
                } else {
                    // SAFETY: the file is opened read-only and treated as immutable while open.
                    #[allow(unsafe_code)]
                    let mmap = unsafe { MmapOptions::new().map(&file)? };
                    Bytes::from_owner(mmap)
                };
                (Backing::Shared(data), len)
            }
            AccessMode::Memory => {
                let data = Bytes::from(std::fs::read(path)?);
                let len = data.len() as u64;
                (Backing::Shared(data), len)
            }
            AccessMode::File => {
                let len = std::fs::metadata(path)?.len();
                (Backing::File(path.to_path_buf()), len)
            }
        };

        debug!("Opened data source {} ({mode}, {len} bytes)", path.display());
        Ok(Self { backing, len, mode })
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self {
            backing: Backing::Shared(data),
            len,
            mode: AccessMode::Memory,
        }
    }

    /// Size of the source in bytes
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Access mode the source was opened with
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Construct a new reader handle positioned at offset 0
    ///
    /// File-backed sources open a new file handle, which can fail.
    pub fn reader(&self) -> StorageResult<SourceReader> {
        let inner = match &self.backing {
            Backing::Shared(data) => ReaderInner::Shared(Cursor::new(data.clone())),
            Backing::File(path) => ReaderInner::File(BufReader::new(File::open(path)?)),
        };
        Ok(SourceReader {
            inner,
            len: self.len,
        })
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("mode", &self.mode)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

enum ReaderInner {
    Shared(Cursor<Bytes>),
    File(BufReader<File>),
}

/// Random-access reader over a [`DataSource`]
///
/// A handle is used by one thread at a time; the pool hands it out
/// exclusively.
pub struct SourceReader {
    inner: ReaderInner,
    len: u64,
}

impl SourceReader {
    /// Size of the underlying source
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the underlying source is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current position
    pub fn position(&mut self) -> StorageResult<u64> {
        Ok(self.stream_position()?)
    }

    /// Move to an absolute offset
    pub fn seek_to(&mut self, offset: u64) -> StorageResult<()> {
        if offset > self.len {
            return Err(StorageError::OutOfBounds {
                offset,
                length: 0,
                size: self.len,
            });
        }
        self.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Read `length` bytes at `offset`
    pub fn read_at(&mut self, offset: u64, length: usize) -> StorageResult<Vec<u8>> {
        let length_u64 = length as u64;
        if offset.saturating_add(length_u64) > self.len {
            return Err(StorageError::OutOfBounds {
                offset,
                length: length_u64,
                size: self.len,
            });
        }

        self.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; length];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Decode a little-endian value at the current position
    pub fn read_le<T>(&mut self) -> StorageResult<T>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        Ok(T::read_options(self, Endian::Little, ())?)
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ReaderInner::Shared(cursor) => cursor.read(buf),
            ReaderInner::File(file) => file.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match &mut self.inner {
            ReaderInner::Shared(cursor) => cursor.seek(pos),
            ReaderInner::File(file) => file.seek(pos),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB])
            .unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_every_access_mode_reads_the_same_bytes() {
        let file = sample_file();
        for mode in [AccessMode::Mapped, AccessMode::File, AccessMode::Memory] {
            let source = DataSource::open(file.path(), mode).unwrap();
            assert_eq!(source.len(), 8);
            assert_eq!(source.mode(), mode);

            let mut reader = source.reader().unwrap();
            assert_eq!(reader.read_le::<u16>().unwrap(), 1);
            assert_eq!(reader.read_le::<u32>().unwrap(), 2);
            assert_eq!(reader.position().unwrap(), 6);
            assert_eq!(reader.read_at(6, 2).unwrap(), vec![0xAA, 0xBB]);
        }
    }

    #[test]
    fn test_read_past_end_is_rejected() {
        let source = DataSource::from_bytes(vec![1u8, 2, 3]);
        let mut reader = source.reader().unwrap();
        let err = reader.read_at(2, 4).unwrap_err();
        assert!(matches!(
            err,
            StorageError::OutOfBounds {
                offset: 2,
                length: 4,
                size: 3
            }
        ));
        assert!(reader.seek_to(4).is_err());
    }

    #[test]
    fn test_truncated_integer_is_io_error() {
        let source = DataSource::from_bytes(vec![1u8]);
        let mut reader = source.reader().unwrap();
        assert!(matches!(
            reader.read_le::<u32>(),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn test_empty_file_maps() {
        let file = NamedTempFile::new().unwrap();
        let source = DataSource::open(file.path(), AccessMode::Mapped).unwrap();
        assert!(source.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = DataSource::open("/nonexistent/sigmatch.dat", AccessMode::File);
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn test_access_mode_parse() {
        assert_eq!("mmap".parse::<AccessMode>().unwrap(), AccessMode::Mapped);
        assert_eq!("Memory".parse::<AccessMode>().unwrap(), AccessMode::Memory);
        assert!("tape".parse::<AccessMode>().is_err());
    }
}
