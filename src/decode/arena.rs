//! Eager arena decoder
//!
//! One contiguous buffer sized for the whole node stream; records are
//! read straight into consecutive slots. Link fields keep their on-disk
//! identities inside the buffer and are turned into slot indices at the
//! moment of use - identity k lives in slot k - 1, known from stream
//! position alone, so resolution never needs the target record's content.

use std::io::Read;

use tracing::debug;

use super::{check_link, read_header, stream_shape};
use crate::format::RecordLayout;
use crate::{Result, TreeFileError};

/// A reconstructed tree backed by one contiguous allocation
///
/// The fastest way to rebuild a persisted tree, intended for trees that
/// will not be mutated afterwards: individual nodes cannot be freed, the
/// whole arena is released as one unit when this value drops.
#[derive(Debug)]
pub struct ArenaTree {
    layout: RecordLayout,
    count: usize,
    buf: Box<[u8]>,
}

impl ArenaTree {
    /// Record geometry this tree was persisted with
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the tree holds no nodes
    ///
    /// Always false in practice: an empty file decodes to `None`, not to
    /// an empty arena.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Root node - the last record of the stream (identity N)
    pub fn root(&self) -> Option<ArenaNodeRef<'_>> {
        if self.count == 0 {
            return None;
        }
        Some(ArenaNodeRef {
            tree: self,
            index: self.count - 1,
        })
    }

    fn record(&self, index: usize) -> &[u8] {
        let size = self.layout.record_size();
        &self.buf[index * size..(index + 1) * size]
    }
}

/// Non-owning handle to one node inside an [`ArenaTree`]
#[derive(Debug, Clone, Copy)]
pub struct ArenaNodeRef<'a> {
    tree: &'a ArenaTree,
    index: usize,
}

impl<'a> ArenaNodeRef<'a> {
    /// Left child, if present
    pub fn left(self) -> Option<ArenaNodeRef<'a>> {
        self.child(self.tree.layout.read_links(self.record()).0)
    }

    /// Right child, if present
    pub fn right(self) -> Option<ArenaNodeRef<'a>> {
        self.child(self.tree.layout.read_links(self.record()).1)
    }

    /// Full record bytes of this node, link words included
    pub fn record(self) -> &'a [u8] {
        self.tree.record(self.index)
    }

    /// Record bytes with the link pair excluded
    pub fn payload(self) -> (&'a [u8], &'a [u8]) {
        self.tree.layout.payload(self.record())
    }

    // identity k -> slot k - 1; links were bounds-checked during decode
    fn child(self, identity: u64) -> Option<ArenaNodeRef<'a>> {
        if identity == 0 {
            return None;
        }
        Some(ArenaNodeRef {
            tree: self.tree,
            index: identity as usize - 1,
        })
    }
}

impl<'a> crate::encode::SourceNode for ArenaNodeRef<'a> {
    fn left(self) -> Option<Self> {
        ArenaNodeRef::left(self)
    }
    fn right(self) -> Option<Self> {
        ArenaNodeRef::right(self)
    }
    fn fill_record(self, record: &mut [u8]) {
        record.copy_from_slice(self.record());
    }
}

/// Check one link field and mark its identity as claimed
///
/// An identity may appear as a child at most once; a second claim would
/// alias one node under two parents, which the heap decoder rejects, so
/// the arena decoder must too.
fn claim_identity(claimed: &mut [bool], identity: u64, index: usize, total: usize) -> Result<()> {
    check_link(identity, index, total)?;
    if identity == 0 {
        return Ok(());
    }
    let slot = &mut claimed[identity as usize];
    if *slot {
        return Err(TreeFileError::CorruptLink {
            identity,
            record: index + 1,
            total,
        });
    }
    *slot = true;
    Ok(())
}

/// Rebuild a persisted tree into a single contiguous arena
///
/// Validates the header, allocates `total_count x record_size` bytes
/// once, and reads records sequentially into consecutive slots, bounds-
/// checking each link (and rejecting doubly claimed children) as it
/// arrives. Returns `None` for an intentionally empty file. O(N) time,
/// one buffer allocation plus the transient claim table.
pub fn decode_arena<R: Read>(mut source: R) -> Result<Option<ArenaTree>> {
    let header = read_header(&mut source)?;
    let Some(shape) = stream_shape(&header)? else {
        return Ok(None);
    };

    let size = shape.layout.record_size();
    let mut buf = vec![0u8; shape.count * size].into_boxed_slice();
    let mut claimed = vec![false; shape.count + 1];
    for index in 0..shape.count {
        let slot = &mut buf[index * size..(index + 1) * size];
        source.read_exact(slot)?;

        let (left, right) = shape.layout.read_links(slot);
        claim_identity(&mut claimed, left, index, shape.count)?;
        claim_identity(&mut claimed, right, index, shape.count)?;
    }

    debug!(nodes = shape.count, "arena decode complete");
    Ok(Some(ArenaTree {
        layout: shape.layout,
        count: shape.count,
        buf,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FileHeader;
    use crate::TreeFileError;
    use std::io::Cursor;

    const LAYOUT: RecordLayout = RecordLayout::assume(17, 0);

    // header + records with payload byte last and links first
    fn stream(records: &[(u8, u64, u64)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        FileHeader::new(LAYOUT, records.len() as i64)
            .write_to(&mut bytes)
            .unwrap();
        for &(payload, left, right) in records {
            let mut record = [0u8; 17];
            LAYOUT.write_links(&mut record, left, right);
            record[16] = payload;
            bytes.extend_from_slice(&record);
        }
        bytes
    }

    #[test]
    fn rebuilds_shape_from_identities() {
        // b=1, c=2, a=3(root) with children 1 and 2
        let bytes = stream(&[(b'b', 0, 0), (b'c', 0, 0), (b'a', 1, 2)]);
        let tree = decode_arena(Cursor::new(bytes)).unwrap().unwrap();

        assert_eq!(tree.len(), 3);
        let root = tree.root().unwrap();
        assert_eq!(root.record()[16], b'a');
        assert_eq!(root.left().unwrap().record()[16], b'b');
        assert_eq!(root.right().unwrap().record()[16], b'c');
        assert!(root.left().unwrap().left().is_none());
    }

    #[test]
    fn empty_stream_decodes_to_none() {
        let bytes = stream(&[]);
        assert!(decode_arena(Cursor::new(bytes)).unwrap().is_none());
    }

    #[test]
    fn forward_reference_fails_decode() {
        // record 1 claims child identity 1 - a self reference
        let bytes = stream(&[(b'x', 1, 0)]);
        let err = decode_arena(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TreeFileError::CorruptLink { identity: 1, .. }));
    }

    #[test]
    fn doubly_claimed_child_is_corrupt() {
        // records 2 and 3 both claim identity 1 as a child; accepting it
        // would alias one node under two parents
        let bytes = stream(&[(b'x', 0, 0), (b'y', 1, 0), (b'z', 1, 2)]);
        let err = decode_arena(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TreeFileError::CorruptLink { identity: 1, .. }));

        // same aliasing inside a single record
        let bytes = stream(&[(b'x', 0, 0), (b'y', 1, 1)]);
        let err = decode_arena(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TreeFileError::CorruptLink { identity: 1, .. }));
    }

    #[test]
    fn hostile_header_with_overflowing_stream_fails_decode() {
        // count x record_size overflows the address space; must surface
        // as corruption, not allocate or panic
        let mut header = FileHeader::new(LAYOUT, 1_i64 << 32);
        header.record_size = 1_i64 << 32;
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();

        let err = decode_arena(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TreeFileError::InvalidLayout(_)));
    }

    #[test]
    fn truncated_stream_fails_with_io() {
        let mut bytes = stream(&[(b'b', 0, 0), (b'a', 1, 0)]);
        bytes.truncate(bytes.len() - 5);
        let err = decode_arena(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TreeFileError::Io(_)));
    }
}
