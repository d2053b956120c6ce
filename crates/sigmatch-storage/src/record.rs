//! Record decoders used by the lazy lists

use crate::error::StorageResult;
use crate::source::SourceReader;
use binrw::BinRead;
use std::marker::PhantomData;

/// Decodes one record from a positioned reader
///
/// The reader is positioned at the first byte of the record. `key` is the
/// list key the record is requested under (an index for fixed lists, a byte
/// offset for variable lists) so records can carry their own identity.
pub trait RecordDecoder: Send + Sync {
    /// Decoded record type
    type Record: Send + Sync + 'static;

    /// Decode the record at the reader's position
    fn decode(&self, reader: &mut SourceReader, key: u32) -> StorageResult<Self::Record>;
}

/// A decoder whose records all occupy the same number of bytes
pub trait FixedRecordDecoder: RecordDecoder {
    /// Encoded size of one record
    fn record_length(&self) -> u32;
}

/// Decoder for any `binrw` type stored little-endian
pub struct LeDecoder<T> {
    record_length: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LeDecoder<T> {
    /// Decoder whose fixed record length is the in-memory size of `T`
    ///
    /// Correct for primitives and arrays of primitives. Use
    /// [`with_length`](Self::with_length) for structs.
    pub const fn new() -> Self {
        Self::with_length(size_of::<T>() as u32)
    }

    /// Decoder with an explicit encoded record length
    pub const fn with_length(record_length: u32) -> Self {
        Self {
            record_length,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for LeDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LeDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeDecoder")
            .field("type", &std::any::type_name::<T>())
            .field("record_length", &self.record_length)
            .finish()
    }
}

impl<T> RecordDecoder for LeDecoder<T>
where
    T: for<'a> BinRead<Args<'a> = ()> + Send + Sync + 'static,
{
    type Record = T;

    fn decode(&self, reader: &mut SourceReader, _key: u32) -> StorageResult<T> {
        reader.read_le()
    }
}

impl<T> FixedRecordDecoder for LeDecoder<T>
where
    T: for<'a> BinRead<Args<'a> = ()> + Send + Sync + 'static,
{
    fn record_length(&self) -> u32 {
        self.record_length
    }
}
