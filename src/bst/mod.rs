//! Demo collaborator: an ordered binary tree of fixed-size keyed records
//!
//! The codec itself is shape-agnostic; this module supplies a concrete
//! tree for the CLI and tests. Nodes carry an `i64` key plus a short
//! label, serialized as a 40-byte record with the link pair at offset 24.
//! Ordering comes from plain binary-search insertion - rebalancing is a
//! concern of whatever tree library a real caller brings, not of the
//! persistence layer.

use std::borrow::Cow;

use byteorder::{ByteOrder, LittleEndian};

use crate::encode::SourceNode;
use crate::format::RecordLayout;
use crate::{Result, TreeFileError};

/// Bytes reserved for a node label (NUL-padded)
pub const LABEL_LEN: usize = 16;

/// Size of one serialized node record: key + label + link pair
pub const RECORD_SIZE: usize = 8 + LABEL_LEN + 16;

/// Byte offset of the link pair inside a record
pub const LINK_OFFSET: usize = 8 + LABEL_LEN;

const LAYOUT: RecordLayout = RecordLayout::assume(RECORD_SIZE, LINK_OFFSET);

/// One node of the demo tree
#[derive(Debug)]
pub struct BstNode {
    key: i64,
    label: [u8; LABEL_LEN],
    left: Option<Box<BstNode>>,
    right: Option<Box<BstNode>>,
}

impl BstNode {
    fn new(key: i64, label: &str) -> Self {
        let mut padded = [0u8; LABEL_LEN];
        let bytes = label.as_bytes();
        let take = bytes.len().min(LABEL_LEN);
        padded[..take].copy_from_slice(&bytes[..take]);
        Self {
            key,
            label: padded,
            left: None,
            right: None,
        }
    }

    /// Ordering key
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Label with NUL padding stripped
    pub fn label(&self) -> Cow<'_, str> {
        let end = self
            .label
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LABEL_LEN);
        String::from_utf8_lossy(&self.label[..end])
    }

    /// Left child, if present
    pub fn left(&self) -> Option<&BstNode> {
        self.left.as_deref()
    }

    /// Right child, if present
    pub fn right(&self) -> Option<&BstNode> {
        self.right.as_deref()
    }
}

impl Drop for BstNode {
    // Iterative teardown, same as the heap decoder's nodes: a degenerate
    // chain must not recurse to tree depth when dropped.
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

impl<'a> SourceNode for &'a BstNode {
    fn left(self) -> Option<Self> {
        BstNode::left(self)
    }
    fn right(self) -> Option<Self> {
        BstNode::right(self)
    }
    fn fill_record(self, record: &mut [u8]) {
        LittleEndian::write_i64(&mut record[..8], self.key);
        record[8..8 + LABEL_LEN].copy_from_slice(&self.label);
    }
}

/// Unbalanced ordered tree keyed by `i64`
#[derive(Debug, Default)]
pub struct BstTree {
    root: Option<Box<BstNode>>,
    len: usize,
}

impl BstTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Record geometry shared by every demo tree
    pub fn layout() -> RecordLayout {
        LAYOUT
    }

    /// Root node, if any
    pub fn root(&self) -> Option<&BstNode> {
        self.root.as_deref()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no nodes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a keyed node; duplicate keys are rejected
    pub fn insert(&mut self, key: i64, label: &str) -> bool {
        let mut link = &mut self.root;
        while let Some(node) = link {
            if key < node.key {
                link = &mut node.left;
            } else if key > node.key {
                link = &mut node.right;
            } else {
                return false;
            }
        }
        *link = Some(Box::new(BstNode::new(key, label)));
        self.len += 1;
        true
    }

    /// Sample tree of `count` sequential keys
    ///
    /// Keys 1..=count inserted midpoint-first so the demo gets a bushy
    /// shape instead of the chain that in-order insertion would produce.
    pub fn sample(count: u64) -> Self {
        let mut tree = Self::new();
        if count == 0 {
            return tree;
        }
        let mut ranges = vec![(1i64, count as i64)];
        while let Some((lo, hi)) = ranges.pop() {
            if lo > hi {
                continue;
            }
            let mid = lo + (hi - lo) / 2;
            tree.insert(mid, &format!("node-{mid}"));
            ranges.push((lo, mid - 1));
            ranges.push((mid + 1, hi));
        }
        tree
    }

    /// Rebuild a demo-tree view from any encodable tree of the same
    /// record geometry - in particular from a decoded [`ArenaTree`] or
    /// [`HeapTree`] root
    ///
    /// Shape-preserving: children stay where the source put them, nothing
    /// is re-inserted by key.
    ///
    /// [`ArenaTree`]: crate::decode::ArenaTree
    /// [`HeapTree`]: crate::decode::HeapTree
    pub fn from_source<N: SourceNode>(layout: RecordLayout, root: Option<N>) -> Result<Self> {
        if layout != LAYOUT {
            return Err(TreeFileError::InvalidLayout(format!(
                "demo tree expects {RECORD_SIZE}-byte records with links at {LINK_OFFSET}, \
                 file has {}-byte records with links at {}",
                layout.record_size(),
                layout.link_offset()
            )));
        }

        enum Phase {
            Left,
            Right,
            Build,
        }
        struct Frame<N> {
            node: N,
            phase: Phase,
            left: Option<Box<BstNode>>,
            right: Option<Box<BstNode>>,
        }

        let mut tree = Self::new();
        let mut scratch = [0u8; RECORD_SIZE];
        let mut stack: Vec<Frame<N>> = Vec::new();
        if let Some(node) = root {
            stack.push(Frame {
                node,
                phase: Phase::Left,
                left: None,
                right: None,
            });
        }

        while let Some(top) = stack.last_mut() {
            match top.phase {
                Phase::Left => {
                    top.phase = Phase::Right;
                    if let Some(child) = top.node.left() {
                        stack.push(Frame {
                            node: child,
                            phase: Phase::Left,
                            left: None,
                            right: None,
                        });
                    }
                }
                Phase::Right => {
                    top.phase = Phase::Build;
                    if let Some(child) = top.node.right() {
                        stack.push(Frame {
                            node: child,
                            phase: Phase::Left,
                            left: None,
                            right: None,
                        });
                    }
                }
                Phase::Build => {
                    top.node.fill_record(&mut scratch);
                    let mut label = [0u8; LABEL_LEN];
                    label.copy_from_slice(&scratch[8..8 + LABEL_LEN]);
                    let built = Box::new(BstNode {
                        key: LittleEndian::read_i64(&scratch[..8]),
                        label,
                        left: top.left.take(),
                        right: top.right.take(),
                    });
                    stack.pop();
                    tree.len += 1;

                    match stack.last_mut() {
                        Some(parent) => match parent.phase {
                            Phase::Right => parent.left = Some(built),
                            Phase::Build => parent.right = Some(built),
                            Phase::Left => unreachable!("child built before parent advanced"),
                        },
                        None => tree.root = Some(built),
                    }
                }
            }
        }

        Ok(tree)
    }

    /// Visit every node in key order, iteratively
    pub fn visit_in_order(&self, visit: &mut dyn FnMut(&BstNode)) {
        let mut stack: Vec<&BstNode> = Vec::new();
        let mut cursor = self.root.as_deref();
        while cursor.is_some() || !stack.is_empty() {
            while let Some(node) = cursor {
                stack.push(node);
                cursor = node.left.as_deref();
            }
            if let Some(node) = stack.pop() {
                visit(node);
                cursor = node.right.as_deref();
            }
        }
    }

    /// Pre-order traversal with explicit gaps for absent children
    ///
    /// Two trees agree on this profile exactly when they have the same
    /// shape and the same per-node payload, which is what the round-trip
    /// and arena/heap-equivalence checks compare.
    pub fn preorder_profile(&self) -> Vec<Option<(i64, [u8; LABEL_LEN])>> {
        let mut profile = Vec::new();
        let mut stack = vec![self.root.as_deref()];
        while let Some(slot) = stack.pop() {
            match slot {
                None => profile.push(None),
                Some(node) => {
                    profile.push(Some((node.key, node.label)));
                    stack.push(node.right.as_deref());
                    stack.push(node.left.as_deref());
                }
            }
        }
        profile
    }

    /// Keys in ascending order
    pub fn keys_in_order(&self) -> Vec<i64> {
        let mut keys = Vec::with_capacity(self.len);
        self.visit_in_order(&mut |node| keys.push(node.key));
        keys
    }
}
