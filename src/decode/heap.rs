//! Incremental heap decoder
//!
//! One boxed allocation per node plus a temporary identity→node
//! translation table. Slot k of the table holds the node with identity k
//! until its parent claims it; slot 0 is permanently empty so identity 0
//! resolves to "no child". The table has `count + 1` entries of reference
//! size - sized by entry count, not by record size.
//!
//! Use this strategy when the rebuilt tree will be mutated further: every
//! node is an independently owned unit the caller can detach and drop.

use std::io::Read;

use tracing::debug;

use super::{read_header, stream_shape};
use crate::format::RecordLayout;
use crate::{Result, TreeFileError};

/// One independently allocated node of a rebuilt tree
///
/// Holds its record bytes (link words zeroed after resolution) and owns
/// its children outright.
#[derive(Debug)]
pub struct HeapNode {
    record: Box<[u8]>,
    left: Option<Box<HeapNode>>,
    right: Option<Box<HeapNode>>,
}

impl HeapNode {
    /// Left child, if present
    pub fn left(&self) -> Option<&HeapNode> {
        self.left.as_deref()
    }

    /// Right child, if present
    pub fn right(&self) -> Option<&HeapNode> {
        self.right.as_deref()
    }

    /// Full record bytes of this node; the link words read as zero
    pub fn record(&self) -> &[u8] {
        &self.record
    }
}

/// A reconstructed tree of individually owned nodes
#[derive(Debug)]
pub struct HeapTree {
    layout: RecordLayout,
    count: usize,
    root: Option<Box<HeapNode>>,
}

impl HeapTree {
    /// Record geometry this tree was persisted with
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the tree holds no nodes
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Root node - the node allocated last (identity N)
    pub fn root(&self) -> Option<&HeapNode> {
        self.root.as_deref()
    }
}

impl Drop for HeapNode {
    // Iterative teardown: dropping a degenerate chain must not recurse
    // to tree depth. Children are detached into a worklist, so by the
    // time any node's own drop glue runs it is a leaf.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        if let Some(left) = self.left.take() {
            pending.push(left);
        }
        if let Some(right) = self.right.take() {
            pending.push(right);
        }
        while let Some(mut node) = pending.pop() {
            if let Some(left) = node.left.take() {
                pending.push(left);
            }
            if let Some(right) = node.right.take() {
                pending.push(right);
            }
        }
    }
}

impl<'a> crate::encode::SourceNode for &'a HeapNode {
    fn left(self) -> Option<Self> {
        HeapNode::left(self)
    }
    fn right(self) -> Option<Self> {
        HeapNode::right(self)
    }
    fn fill_record(self, record: &mut [u8]) {
        record.copy_from_slice(&self.record);
    }
}

/// Take ownership of the child with the given identity out of the table
///
/// Identity 0 is no child. Anything else must name a slot populated by an
/// earlier record and not yet claimed by another parent; both failures
/// mean the link field is corrupt.
fn claim_child(
    slots: &mut [Option<Box<HeapNode>>],
    identity: u64,
    index: usize,
    total: usize,
) -> Result<Option<Box<HeapNode>>> {
    if identity == 0 {
        return Ok(None);
    }
    let corrupt = || TreeFileError::CorruptLink {
        identity,
        record: index + 1,
        total,
    };
    if identity > index as u64 {
        return Err(corrupt());
    }
    let child = slots[identity as usize].take().ok_or_else(corrupt)?;
    Ok(Some(child))
}

/// Rebuild a persisted tree with one allocation per node
///
/// Validates the header, then processes records strictly in stream order:
/// box a fresh node, read its bytes, claim its children out of the
/// translation table by identity, store the node into its own slot. The
/// table is discarded when the pass finishes; the root is the node from
/// the final record. Returns `None` for an intentionally empty file.
/// A failure mid-stream drops every node built so far.
pub fn decode_heap<R: Read>(mut source: R) -> Result<Option<HeapTree>> {
    let header = read_header(&mut source)?;
    let Some(shape) = stream_shape(&header)? else {
        return Ok(None);
    };

    let mut slots: Vec<Option<Box<HeapNode>>> = Vec::with_capacity(shape.count + 1);
    slots.push(None); // identity 0 never resolves to a node

    for index in 0..shape.count {
        let mut record = vec![0u8; shape.layout.record_size()].into_boxed_slice();
        source.read_exact(&mut record)?;

        let (left_id, right_id) = shape.layout.read_links(&record);
        let left = claim_child(&mut slots, left_id, index, shape.count)?;
        let right = claim_child(&mut slots, right_id, index, shape.count)?;
        shape.layout.clear_links(&mut record);

        slots.push(Some(Box::new(HeapNode {
            record,
            left,
            right,
        })));
    }

    let root = slots.pop().flatten();
    debug!(nodes = shape.count, "heap decode complete");
    Ok(Some(HeapTree {
        layout: shape.layout,
        count: shape.count,
        root,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FileHeader;
    use std::io::Cursor;

    const LAYOUT: RecordLayout = RecordLayout::assume(17, 0);

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
    fn rebuilds_shape_and_zeroes_links() {
        let bytes = stream(&[(b'b', 0, 0), (b'c', 0, 0), (b'a', 1, 2)]);
        let tree = decode_heap(Cursor::new(bytes)).unwrap().unwrap();

        assert_eq!(tree.len(), 3);
        let root = tree.root().unwrap();
        assert_eq!(root.record()[16], b'a');
        assert_eq!(root.left().unwrap().record()[16], b'b');
        assert_eq!(root.right().unwrap().record()[16], b'c');

        // resolved records carry no identities in their link words
        assert_eq!(LAYOUT.read_links(root.record()), (0, 0));
    }

    #[test]
    fn empty_stream_decodes_to_none() {
        let bytes = stream(&[]);
        assert!(decode_heap(Cursor::new(bytes)).unwrap().is_none());
    }

    #[test]
    fn doubly_claimed_child_is_corrupt() {
        // records 2 and 3 both claim identity 1 as a child
        let bytes = stream(&[(b'x', 0, 0), (b'y', 1, 0), (b'z', 1, 2)]);
        let err = decode_heap(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TreeFileError::CorruptLink { identity: 1, .. }));
    }

    #[test]
    fn deep_chain_drops_without_recursion() {
        // 50k-node left chain: record i links to identity i as left child
        let count = 50_000u64;
        let mut bytes = Vec::new();
        FileHeader::new(LAYOUT, count as i64)
            .write_to(&mut bytes)
            .unwrap();
        for id in 1..=count {
            let mut record = [0u8; 17];
            LAYOUT.write_links(&mut record, id - 1, 0);
            bytes.extend_from_slice(&record);
        }

        let tree = decode_heap(Cursor::new(bytes)).unwrap().unwrap();
        assert_eq!(tree.len(), 50_000);
        drop(tree); // must not overflow the call stack
    }
}
