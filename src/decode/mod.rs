//! Tree reconstruction from persisted files
//!
//! Both decoders share header validation and exploit the same property:
//! records arrive in post-order identity order, so every child identity a
//! record mentions resolves to a record read earlier in the same pass.
//! They differ only in ownership - one contiguous arena versus one
//! allocation per node.

mod arena;
mod heap;

pub use arena::{decode_arena, ArenaNodeRef, ArenaTree};
pub use heap::{decode_heap, HeapNode, HeapTree};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::format::{FileHeader, RecordLayout, FILE_MAGIC};
use crate::{Result, TreeFileError};

/// Read a header and check its magic tag
///
/// Fails with [`TreeFileError::BadMagic`] before anything is allocated if
/// the first eight bytes do not name this format. The remaining fields
/// are returned unvalidated; decoders interpret them via [`stream_shape`].
pub fn read_header<R: Read>(source: &mut R) -> Result<FileHeader> {
    let header = FileHeader::read_from(source)?;
    if header.magic != *FILE_MAGIC {
        return Err(TreeFileError::BadMagic {
            found: header.magic,
        });
    }
    Ok(header)
}

/// Read and magic-check the header of the file at `path`
pub fn read_header_from_path<P: AsRef<Path>>(path: P) -> Result<FileHeader> {
    let file = File::open(path.as_ref())?;
    read_header(&mut BufReader::new(file))
}

/// Validated node-stream geometry: record layout plus record count
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamShape {
    pub layout: RecordLayout,
    pub count: usize,
}

/// Interpret a magic-checked header
///
/// `None` is the deliberate empty-tree case (zero count or zero record
/// size), not a failure. Negative fields and geometry that cannot hold
/// the link pair are corrupt and rejected.
pub(crate) fn stream_shape(header: &FileHeader) -> Result<Option<StreamShape>> {
    if header.is_empty() {
        return Ok(None);
    }
    if header.total_count < 0 || header.record_size < 0 || header.link_offset < 0 {
        return Err(TreeFileError::InvalidLayout(format!(
            "negative header field (count {}, record size {}, link offset {})",
            header.total_count, header.record_size, header.link_offset
        )));
    }
    let layout = RecordLayout::new(header.record_size as usize, header.link_offset as usize)?;
    let count = header.total_count as usize;
    // a hostile header can claim a stream larger than the address space;
    // the arena decoder sizes its buffer from this product
    if count.checked_mul(layout.record_size()).is_none() {
        return Err(TreeFileError::InvalidLayout(format!(
            "node stream of {count} records x {} bytes overflows",
            layout.record_size()
        )));
    }
    Ok(Some(StreamShape { layout, count }))
}

/// Check one link field against the number of records read so far
///
/// `index` is the zero-based position of the record holding the link, so
/// its own identity is `index + 1` and any child identity must be at most
/// `index`. Anything larger is a forward reference the post-order
/// invariant forbids, and would index out of bounds if trusted.
pub(crate) fn check_link(identity: u64, index: usize, total: usize) -> Result<()> {
    if identity > index as u64 {
        return Err(TreeFileError::CorruptLink {
            identity,
            record: index + 1,
            total,
        });
    }
    Ok(())
}

/// Rebuild the tree in the file at `path` into a contiguous arena
pub fn load_arena<P: AsRef<Path>>(path: P) -> Result<Option<ArenaTree>> {
    let file = File::open(path.as_ref())?;
    decode_arena(BufReader::new(file))
}

/// Rebuild the tree in the file at `path` as individually owned nodes
pub fn load_heap<P: AsRef<Path>>(path: P) -> Result<Option<HeapTree>> {
    let file = File::open(path.as_ref())?;
    decode_heap(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn magic_mismatch_is_rejected() {
        let layout = RecordLayout::new(24, 8).unwrap();
        let mut bytes = Vec::new();
        FileHeader::new(layout, 1).write_to(&mut bytes).unwrap();
        bytes[0] = b'X';

        let err = read_header(&mut Cursor::new(bytes)).unwrap_err();
        match err {
            TreeFileError::BadMagic { found } => assert_eq!(found[0], b'X'),
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn zero_fields_mean_empty_not_error() {
        let layout = RecordLayout::new(24, 8).unwrap();
        let header = FileHeader::new(layout, 0);
        assert!(stream_shape(&header).unwrap().is_none());

        let mut bogus = FileHeader::new(layout, 5);
        bogus.record_size = 0;
        assert!(stream_shape(&bogus).unwrap().is_none());
    }

    #[test]
    fn negative_and_undersized_headers_are_corrupt() {
        let layout = RecordLayout::new(24, 8).unwrap();

        let mut negative = FileHeader::new(layout, 5);
        negative.total_count = -1;
        assert!(stream_shape(&negative).is_err());

        let mut cramped = FileHeader::new(layout, 5);
        cramped.record_size = 10; // too small for the 16-byte link pair
        assert!(stream_shape(&cramped).is_err());
    }

    #[test]
    fn oversized_stream_claim_is_corrupt() {
        let layout = RecordLayout::new(24, 8).unwrap();
        let mut huge = FileHeader::new(layout, 1_i64 << 32);
        huge.record_size = 1_i64 << 32;
        let err = stream_shape(&huge).unwrap_err();
        assert!(matches!(err, TreeFileError::InvalidLayout(_)));
    }

    #[test]
    fn forward_link_references_are_corrupt() {
        assert!(check_link(0, 0, 4).is_ok());
        assert!(check_link(3, 3, 4).is_ok());
        let err = check_link(4, 3, 4).unwrap_err();
        match err {
            TreeFileError::CorruptLink {
                identity, record, ..
            } => {
                assert_eq!(identity, 4);
                assert_eq!(record, 4);
            }
            other => panic!("expected CorruptLink, got {other:?}"),
        }
    }
}
