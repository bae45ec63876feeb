//! # treefile — flat-file persistence for binary trees
//!
//! Saves an in-memory binary tree of fixed-size records to a single flat
//! file and later rebuilds an equivalent tree, without ever storing raw
//! memory addresses.
//!
//! ## Core idea
//!
//! Nodes are written in post-order and numbered 1..N as they are visited,
//! so every node's identity is strictly greater than the identities of
//! both its children. On disk, the two child-link words of a record hold
//! those identities (0 = absent child). When the file is read back, every
//! identity a record references has already appeared earlier in the
//! stream, so links resolve in a single forward pass with no forward
//! references.
//!
//! ## Two reconstruction strategies
//!
//! 1. **Arena** ([`decode_arena`]): one contiguous allocation backs all
//!    nodes. O(N) time, a single buffer; the rebuilt tree can only be
//!    released as a whole.
//! 2. **Heap** ([`decode_heap`]): every node is an independently owned
//!    allocation, resolved through an identity→node translation table.
//!    Use this when the rebuilt tree will be mutated further.
//!
//! ## Usage example
//!
//! ```ignore
//! use treefile::{save_to_path, load_arena, RecordLayout};
//!
//! let layout = RecordLayout::new(40, 24)?;
//! save_to_path("tree.bin", layout, my_tree.root())?;
//! let rebuilt = load_arena("tree.bin")?; // None for an empty tree
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules - on-disk format, the encoder, and both decoders
pub mod bst;    // demo collaborator: ordered tree of keyed records
pub mod decode; // arena + heap reconstruction
pub mod encode; // post-order identity assignment + record stream
pub mod format; // file header and record geometry

// Re-exports for convenience
pub use decode::{
    decode_arena, decode_heap, load_arena, load_heap, read_header, read_header_from_path,
    ArenaNodeRef, ArenaTree, HeapNode, HeapTree,
};
pub use encode::{encode_tree, save_to_path, SourceNode};
pub use format::{FileHeader, RecordLayout, FILE_MAGIC};

use thiserror::Error;

/// Errors that can occur while persisting or rebuilding a tree
#[derive(Error, Debug)]
pub enum TreeFileError {
    /// Sink or source open, read, write, or seek failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The first eight bytes of the file do not name this format
    #[error("bad file magic {found:?}")]
    BadMagic {
        /// The eight bytes actually found where the magic tag belongs
        found: [u8; 8],
    },

    /// Record geometry that cannot hold the two link words
    #[error("invalid record layout: {0}")]
    InvalidLayout(String),

    /// A link field references an identity the stream cannot have
    /// assigned yet, violating the post-order invariant
    #[error("corrupt link in record {record} of {total}: identity {identity} not yet assigned")]
    CorruptLink {
        /// The identity stored in the offending link field
        identity: u64,
        /// One-based position of the record holding the bad link
        record: usize,
        /// Total record count claimed by the header
        total: usize,
    },
}

/// Result alias for tree persistence operations
pub type Result<T> = std::result::Result<T, TreeFileError>;
