//! B-tree used as the ordered medium under every store and index.
//!
//! # Structure
//!
//! The B-tree consists of:
//! - Internal nodes: store keys and child node pointers
//! - Leaf nodes: store key-value pairs, doubly-linked for efficient range scans
//!
//! # Key Format
//!
//! Keys are 56 bytes compared lexicographically. Callers build them from
//! big-endian parts with `make_key`, so byte order equals numeric order.
//!
//! # Usage
//!
//! ```
//! use tablestore::storage::btree::{BTree, KEY_SIZE, make_key};
//!
//! let mut tree = BTree::new();
//! let key = make_key(&[&7u64.to_be_bytes()]);
//! assert_eq!(key.len(), KEY_SIZE);
//!
//! tree.insert(key, b"hello".to_vec()).unwrap();
//! assert_eq!(tree.get(&key).unwrap(), Some(b"hello".as_slice()));
//! ```

mod node;
mod tree;

pub use node::{
    InternalNode, KEY_SIZE, Key, LeafEntry, LeafNode, MAX_INLINE_VALUE_SIZE, NODE_SIZE, NodeError,
    NodeHeader, NodeId, NodeType, compare_keys, make_key,
};
pub use tree::{BTree, BTreeError, BTreeIterator};
