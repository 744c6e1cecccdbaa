//! B-tree node types.
//!
//! Nodes are sized as if they were 8KB pages so that fan-out and split
//! behaviour match a paged layout:
//! - Internal nodes: store keys and child node pointers
//! - Leaf nodes: store key-value pairs, doubly-linked for range scans

use std::cmp::Ordering;

/// Size of a key in bytes.
///
/// Wide enough for a partition prefix (16), a digest-sized secondary key
/// (32) and a sequence number (8).
pub const KEY_SIZE: usize = 56;

/// A fixed-width key, compared lexicographically.
pub type Key = [u8; KEY_SIZE];

/// Identifier of a node inside a tree. 0 means "no node".
pub type NodeId = u64;

/// Byte budget of one node.
pub const NODE_SIZE: usize = 8192;

/// Per-node bookkeeping: node type (1), key count (2), parent, prev and next
/// pointers (8 each).
const NODE_HEADER_SIZE: usize = 27;

/// Available space for node data.
const DATA_SPACE: usize = NODE_SIZE - NODE_HEADER_SIZE;

/// Internal node entry size: key + child pointer (8 bytes).
const INTERNAL_ENTRY_SIZE: usize = KEY_SIZE + 8;

/// Maximum number of keys in an internal node.
/// `DATA_SPACE` = N * `KEY_SIZE` + (N+1) * 8
pub const MAX_INTERNAL_KEYS: usize = (DATA_SPACE - 8) / INTERNAL_ENTRY_SIZE;

/// Leaf entry overhead: key + `value_len` (2 bytes).
const LEAF_ENTRY_OVERHEAD: usize = KEY_SIZE + 2;

/// Maximum value size a leaf accepts: a 1KB record plus its 8-byte header.
pub const MAX_INLINE_VALUE_SIZE: usize = 1032;

// A size-balanced split of a full leaf must leave both halves within budget.
const _: () = assert!(4 * (LEAF_ENTRY_OVERHEAD + MAX_INLINE_VALUE_SIZE) <= DATA_SPACE);

/// Node type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

/// Header information for a B-tree node.
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    pub node_type: NodeType,
    pub parent: NodeId,
    pub prev_leaf: NodeId,
    pub next_leaf: NodeId,
}

impl NodeHeader {
    const fn new(node_type: NodeType, parent: NodeId) -> Self {
        Self {
            node_type,
            parent,
            prev_leaf: 0,
            next_leaf: 0,
        }
    }
}

/// A tree node.
#[derive(Debug, Clone)]
pub enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    pub const fn header_mut(&mut self) -> &mut NodeHeader {
        match self {
            Self::Internal(n) => &mut n.header,
            Self::Leaf(n) => &mut n.header,
        }
    }
}

/// An internal (non-leaf) B-tree node.
///
/// Stores N keys and N+1 child pointers.
/// `Child[i]` contains keys < `Key[i]`
/// `Child[i+1]` contains keys >= `Key[i]`
#[derive(Debug, Clone)]
pub struct InternalNode {
    pub header: NodeHeader,
    /// Keys in sorted order.
    pub keys: Vec<Key>,
    /// Child pointers. `children.len()` == `keys.len()` + 1
    pub children: Vec<NodeId>,
}

impl InternalNode {
    /// Create an internal node with initial children.
    #[must_use]
    pub fn with_children(parent: NodeId, left_child: NodeId, key: Key, right_child: NodeId) -> Self {
        Self {
            header: NodeHeader::new(NodeType::Internal, parent),
            keys: vec![key],
            children: vec![left_child, right_child],
        }
    }

    /// Find the child index for a given key.
    #[must_use]
    pub fn find_child_index(&self, key: &Key) -> usize {
        match self.keys.binary_search(key) {
            Ok(i) => i + 1, // Exact match, go right
            Err(i) => i,
        }
    }

    /// Check if the node is full.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is not const-stable
    pub fn is_full(&self) -> bool {
        self.keys.len() >= MAX_INTERNAL_KEYS
    }

    /// Insert a key and right child at the appropriate position.
    pub fn insert(&mut self, key: Key, right_child: NodeId) {
        let idx = self.find_child_index(&key);
        self.keys.insert(idx, key);
        self.children.insert(idx + 1, right_child);
    }

    /// Split the node, returning the median key and the new right node.
    ///
    /// The median moves up to the parent and is kept in neither half.
    #[must_use]
    pub fn split(&mut self) -> (Key, Self) {
        let mid = self.keys.len() / 2;
        let median_key = self.keys[mid];

        let right_keys: Vec<Key> = self.keys.drain(mid + 1..).collect();
        let right_children: Vec<NodeId> = self.children.drain(mid + 1..).collect();
        self.keys.pop();

        let right_node = Self {
            header: NodeHeader::new(NodeType::Internal, self.header.parent),
            keys: right_keys,
            children: right_children,
        };

        (median_key, right_node)
    }
}

/// A key-value entry in a leaf node.
#[derive(Debug, Clone)]
pub struct LeafEntry {
    pub key: Key,
    pub value: Vec<u8>,
}

impl LeafEntry {
    fn size(&self) -> usize {
        LEAF_ENTRY_OVERHEAD + self.value.len()
    }
}

/// A leaf B-tree node.
#[derive(Debug, Clone)]
pub struct LeafNode {
    pub header: NodeHeader,
    /// Entries in sorted order by key.
    pub entries: Vec<LeafEntry>,
}

impl LeafNode {
    /// Create a new empty leaf node.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::new() is not const-stable
    pub fn new(parent: NodeId) -> Self {
        Self {
            header: NodeHeader::new(NodeType::Leaf, parent),
            entries: Vec::new(),
        }
    }

    fn entries_size(&self) -> usize {
        self.entries.iter().map(LeafEntry::size).sum()
    }

    /// Check whether the node's entries are within its byte budget.
    #[must_use]
    pub fn fits(&self) -> bool {
        self.entries_size() <= DATA_SPACE
    }

    /// Find the index where a key should be inserted (or exists).
    pub fn find_index(&self, key: &Key) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.cmp(key))
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&[u8]> {
        self.find_index(key)
            .ok()
            .map(|i| self.entries[i].value.as_slice())
    }

    /// Insert or update an entry.
    ///
    /// Returns the old value if updating, None if inserting.
    pub fn insert(&mut self, key: Key, value: Vec<u8>) -> Option<Vec<u8>> {
        match self.find_index(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].value, value)),
            Err(i) => {
                self.entries.insert(i, LeafEntry { key, value });
                None
            }
        }
    }

    /// Remove an entry by key.
    pub fn remove(&mut self, key: &Key) -> Option<Vec<u8>> {
        self.find_index(key)
            .ok()
            .map(|i| self.entries.remove(i).value)
    }

    /// Split the node by size, returning the split key and the new right node.
    ///
    /// The split point is the first entry at which the running size passes
    /// half of the total. Both halves are non-empty when the node holds at
    /// least two entries.
    #[must_use]
    pub fn split(&mut self) -> (Key, Self) {
        let half = self.entries_size() / 2;
        let mut running = 0;
        let mut mid = self.entries.len() - 1;
        for (i, entry) in self.entries.iter().enumerate() {
            running += entry.size();
            if running > half {
                mid = i;
                break;
            }
        }
        let mid = mid.max(1);

        let right_entries: Vec<LeafEntry> = self.entries.drain(mid..).collect();
        let split_key = right_entries[0].key;

        let mut header = NodeHeader::new(NodeType::Leaf, self.header.parent);
        header.next_leaf = self.header.next_leaf;
        let right_node = Self {
            header,
            entries: right_entries,
        };

        (split_key, right_node)
    }
}

/// Errors that can occur when working with B-tree nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// A node pointer refers to a node that does not exist.
    MissingNode(NodeId),
    /// Wrong node type for operation.
    WrongNodeType(NodeId),
    /// Value too large to store inline.
    ValueTooLarge(usize),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingNode(id) => write!(f, "node {id} does not exist"),
            Self::WrongNodeType(id) => write!(f, "wrong node type for operation on node {id}"),
            Self::ValueTooLarge(size) => {
                write!(
                    f,
                    "value too large: {size} bytes (max {MAX_INLINE_VALUE_SIZE})"
                )
            }
        }
    }
}

impl std::error::Error for NodeError {}

/// Compare two keys.
#[must_use]
pub fn compare_keys(a: &Key, b: &Key) -> Ordering {
    a.cmp(b)
}

/// Build a key from big-endian parts, zero padding the remainder.
///
/// # Panics
///
/// Panics if the parts are longer than `KEY_SIZE` in total.
#[must_use]
pub fn make_key(parts: &[&[u8]]) -> Key {
    let mut key = [0u8; KEY_SIZE];
    let mut offset = 0;
    for part in parts {
        key[offset..offset + part.len()].copy_from_slice(part);
        offset += part.len();
    }
    key
}
