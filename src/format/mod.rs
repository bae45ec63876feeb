//! On-disk format definitions
//!
//! A persisted tree is a fixed 32-byte header followed by `total_count`
//! records of `record_size` bytes each, in post-order identity order
//! 1..N. The header field order (magic, link offset, count, record size)
//! is part of the format and must match between writer and reader.

mod layout;

pub use layout::{RecordLayout, LINK_PAIR_LEN, LINK_WORD_LEN};

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Magic tag opening every tree file
pub const FILE_MAGIC: &[u8; 8] = b"TREEFILE";

/// Fixed-size preamble of a tree file
///
/// Written once with `total_count = 0` before the node stream, then
/// rewritten in place once the final count is known. A file whose header
/// still says zero (e.g. after a crash mid-encode) reads back as an
/// empty tree, never as a partial one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format magic, compared byte-for-byte against [`FILE_MAGIC`]
    pub magic: [u8; 8],
    /// Byte offset of the two link words inside each record
    pub link_offset: i64,
    /// Number of records in the node stream
    pub total_count: i64,
    /// Byte length of one record
    pub record_size: i64,
}

impl FileHeader {
    /// Serialized header length in bytes
    pub const SIZE: usize = 8 + 8 + 8 + 8;

    /// Header describing `total_count` records of the given geometry
    pub fn new(layout: RecordLayout, total_count: i64) -> Self {
        Self {
            magic: *FILE_MAGIC,
            link_offset: layout.link_offset() as i64,
            total_count,
            record_size: layout.record_size() as i64,
        }
    }

    /// Serialize the header to `writer`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_i64::<LittleEndian>(self.link_offset)?;
        writer.write_i64::<LittleEndian>(self.total_count)?;
        writer.write_i64::<LittleEndian>(self.record_size)?;
        Ok(())
    }

    /// Deserialize a header from `reader` without validating it
    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        let link_offset = reader.read_i64::<LittleEndian>()?;
        let total_count = reader.read_i64::<LittleEndian>()?;
        let record_size = reader.read_i64::<LittleEndian>()?;
        Ok(Self {
            magic,
            link_offset,
            total_count,
            record_size,
        })
    }

    /// Whether the header announces an intentionally empty tree
    ///
    /// Zero count or zero record size both mean "no tree here"; the
    /// original format treats either as the empty case.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0 || self.record_size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let layout = RecordLayout::new(40, 24).unwrap();
        let header = FileHeader::new(layout, 9);

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), FileHeader::SIZE);
        assert_eq!(&bytes[..8], FILE_MAGIC);

        let back = FileHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn zero_count_and_zero_record_size_are_empty() {
        let layout = RecordLayout::new(24, 8).unwrap();
        assert!(FileHeader::new(layout, 0).is_empty());

        let mut header = FileHeader::new(layout, 3);
        assert!(!header.is_empty());
        header.record_size = 0;
        assert!(header.is_empty());
    }
}
