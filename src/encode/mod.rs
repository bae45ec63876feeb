//! Post-order tree encoder
//!
//! Walks a caller-owned tree in post-order, assigns each node a dense
//! identity as it is visited (children strictly before parents), and
//! appends one record per node to the sink. Child identities are spliced
//! into a scratch copy of each record image, so the caller's tree is
//! never mutated - not even transiently, and not on a failed write.
//!
//! The walk uses an explicit frame stack rather than recursion, so a
//! degenerate million-node chain encodes in constant call-stack space.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::format::{FileHeader, RecordLayout};
use crate::Result;

/// Handle to one node of an encodable tree
///
/// The encoder is shape-agnostic: it needs child navigation and a record
/// image per node, nothing else. Handles are plain `Copy` values
/// (references, arena indices) so frames can hold them cheaply.
pub trait SourceNode: Copy {
    /// Left child handle, if present
    fn left(self) -> Option<Self>;

    /// Right child handle, if present
    fn right(self) -> Option<Self>;

    /// Write this node's full record image into `record`
    ///
    /// `record` is exactly `record_size` bytes. Whatever this writes into
    /// the link-field region is overwritten with child identities before
    /// the record reaches the sink.
    fn fill_record(self, record: &mut [u8]);
}

/// Where a traversal frame currently stands
enum Phase {
    /// Left subtree not yet visited
    Left,
    /// Left subtree done, right subtree not yet visited
    Right,
    /// Both subtrees done; the node itself is next to emit
    Emit,
}

struct Frame<N> {
    node: N,
    phase: Phase,
    left_id: u64,
    right_id: u64,
}

impl<N> Frame<N> {
    fn new(node: N) -> Self {
        Self {
            node,
            phase: Phase::Left,
            left_id: 0,
            right_id: 0,
        }
    }
}

/// Encode a tree into `sink` as header + post-order record stream
///
/// Writes the header first with a zero count, streams the records, then
/// seeks back and rewrites the header with the final count. Returns the
/// number of nodes written. An absent `root` produces a valid file whose
/// header says zero records.
///
/// The sink is left positioned at the header; a write failure aborts
/// immediately, leaving the sink partial but the source tree untouched.
pub fn encode_tree<N, W>(layout: RecordLayout, root: Option<N>, mut sink: W) -> Result<u64>
where
    N: SourceNode,
    W: Write + Seek,
{
    let mut header = FileHeader::new(layout, 0);
    header.write_to(&mut sink)?;

    let mut count: u64 = 0;
    let mut scratch = vec![0u8; layout.record_size()];
    let mut stack: Vec<Frame<N>> = Vec::new();
    if let Some(node) = root {
        stack.push(Frame::new(node));
    }

    while let Some(top) = stack.last_mut() {
        match top.phase {
            Phase::Left => {
                top.phase = Phase::Right;
                if let Some(child) = top.node.left() {
                    stack.push(Frame::new(child));
                }
            }
            Phase::Right => {
                top.phase = Phase::Emit;
                if let Some(child) = top.node.right() {
                    stack.push(Frame::new(child));
                }
            }
            Phase::Emit => {
                let node = top.node;
                let (left_id, right_id) = (top.left_id, top.right_id);
                stack.pop();

                count += 1;
                node.fill_record(&mut scratch);
                layout.write_links(&mut scratch, left_id, right_id);
                sink.write_all(&scratch)?;

                // Report this subtree's identity to the parent frame. The
                // parent sits in Right while its left subtree is emitted
                // and in Emit while its right subtree is emitted.
                if let Some(parent) = stack.last_mut() {
                    match parent.phase {
                        Phase::Right => parent.left_id = count,
                        Phase::Emit => parent.right_id = count,
                        Phase::Left => unreachable!("child emitted before parent advanced"),
                    }
                }
            }
        }
    }

    header.total_count = count as i64;
    sink.seek(SeekFrom::Start(0))?;
    header.write_to(&mut sink)?;
    sink.flush()?;

    debug!(nodes = count, record_size = layout.record_size(), "tree encoded");
    Ok(count)
}

/// Encode a tree into a freshly created file at `path`
///
/// Buffered equivalent of [`encode_tree`] for the common file case.
pub fn save_to_path<N, P>(path: P, layout: RecordLayout, root: Option<N>) -> Result<u64>
where
    N: SourceNode,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_tree(layout, root, BufWriter::new(file))
}
