//! Length-prefixed byte strings referenced by nodes and child entries

use sigmatch_storage::{RecordDecoder, SourceReader, StorageResult};

/// Decodes `u16 length + bytes`
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDecoder;

impl RecordDecoder for StringDecoder {
    type Record = Vec<u8>;

    fn decode(&self, reader: &mut SourceReader, _key: u32) -> StorageResult<Vec<u8>> {
        let length: u16 = reader.read_le()?;
        let start = reader.position()?;
        reader.read_at(start, usize::from(length))
    }
}

/// Encode one string record
pub(crate) fn encode_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
}
