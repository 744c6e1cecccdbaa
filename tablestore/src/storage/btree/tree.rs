//! B-tree over an in-memory node arena.
//!
//! Nodes live in a `Vec` and refer to each other by `NodeId` (index + 1, so
//! that 0 can mean "no node"). Nodes are never freed: removal leaves empty
//! leaves in the chain and iteration skips over them.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::btree::node::{
    InternalNode, Key, LeafNode, MAX_INLINE_VALUE_SIZE, Node, NodeError, NodeId,
};

/// An ordered map from fixed-width keys to byte values.
#[derive(Debug, Clone)]
pub struct BTree {
    nodes: Vec<Node>,
    root: NodeId,
    len: usize,
}

impl Default for BTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BTree {
    /// Create a new empty tree with a leaf root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Leaf(LeafNode::new(0))],
            root: 1,
            len: 0,
        }
    }

    /// Number of entries in the tree.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes allocated so far.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is not const-stable
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &Key) -> Result<Option<&[u8]>, BTreeError> {
        let leaf_id = self.find_leaf(key)?;
        Ok(self.leaf(leaf_id)?.get(key))
    }

    /// Insert or update a key-value pair.
    ///
    /// Returns the old value if updating, None if inserting.
    pub fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<Option<Vec<u8>>, BTreeError> {
        if value.len() > MAX_INLINE_VALUE_SIZE {
            return Err(NodeError::ValueTooLarge(value.len()).into());
        }

        let leaf_id = self.find_leaf(&key)?;
        let leaf = self.leaf_mut(leaf_id)?;
        let old_value = leaf.insert(key, value);
        let needs_split = !leaf.fits();

        if old_value.is_none() {
            self.len += 1;
        }
        if needs_split {
            self.split_leaf(leaf_id)?;
        }

        Ok(old_value)
    }

    /// Remove a key-value pair.
    ///
    /// Returns the removed value if found.
    pub fn remove(&mut self, key: &Key) -> Result<Option<Vec<u8>>, BTreeError> {
        let leaf_id = self.find_leaf(key)?;
        let removed = self.leaf_mut(leaf_id)?.remove(key);

        // Underflowing leaves are not merged.
        if removed.is_some() {
            self.len -= 1;
        }

        Ok(removed)
    }

    /// Create a cursor over all entries in key order.
    pub fn cursor(&self) -> Result<BTreeIterator<'_>, BTreeError> {
        let mut current = self.root;

        loop {
            match self.node(current)? {
                Node::Leaf(_) => {
                    return Ok(BTreeIterator {
                        tree: self,
                        current,
                        index: 0,
                    });
                }
                Node::Internal(node) => current = node.children[0],
            }
        }
    }

    /// Create an iterator starting at the first key >= `start_key`.
    pub fn iter_from(&self, start_key: &Key) -> Result<BTreeIterator<'_>, BTreeError> {
        let leaf_id = self.find_leaf(start_key)?;
        let leaf = self.leaf(leaf_id)?;

        Ok(BTreeIterator {
            tree: self,
            current: leaf_id,
            index: leaf.find_index(start_key).unwrap_or_else(|i| i),
        })
    }

    /// Count entries by walking the leaf chain.
    ///
    /// Agrees with `len()` unless the tree is corrupt.
    pub fn count(&self) -> Result<usize, BTreeError> {
        let mut count = 0;
        let mut iter = self.cursor()?;
        while iter.next_entry()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn node(&self, id: NodeId) -> Result<&Node, BTreeError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.nodes.get(i))
            .ok_or(BTreeError::Node(NodeError::MissingNode(id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, BTreeError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.nodes.get_mut(i))
            .ok_or(BTreeError::Node(NodeError::MissingNode(id)))
    }

    fn leaf(&self, id: NodeId) -> Result<&LeafNode, BTreeError> {
        match self.node(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(NodeError::WrongNodeType(id).into()),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> Result<&mut LeafNode, BTreeError> {
        match self.node_mut(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(NodeError::WrongNodeType(id).into()),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> Result<&mut InternalNode, BTreeError> {
        match self.node_mut(id)? {
            Node::Internal(node) => Ok(node),
            Node::Leaf(_) => Err(NodeError::WrongNodeType(id).into()),
        }
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() as NodeId
    }

    /// Find the leaf node that should contain the given key.
    fn find_leaf(&self, key: &Key) -> Result<NodeId, BTreeError> {
        let mut current = self.root;

        loop {
            match self.node(current)? {
                Node::Leaf(_) => return Ok(current),
                Node::Internal(node) => current = node.children[node.find_child_index(key)],
            }
        }
    }

    /// Split an over-budget leaf and link the new right half into the chain.
    fn split_leaf(&mut self, leaf_id: NodeId) -> Result<(), BTreeError> {
        let leaf = self.leaf_mut(leaf_id)?;
        let (split_key, mut right_leaf) = leaf.split();
        let parent = leaf.header.parent;
        let next = right_leaf.header.next_leaf;

        right_leaf.header.prev_leaf = leaf_id;
        let right_id = self.allocate(Node::Leaf(right_leaf));

        self.leaf_mut(leaf_id)?.header.next_leaf = right_id;
        if next != 0 {
            self.leaf_mut(next)?.header.prev_leaf = right_id;
        }

        self.insert_into_parent(leaf_id, split_key, right_id, parent)
    }

    /// Insert a new key into a parent node after a child split.
    fn insert_into_parent(
        &mut self,
        left_child: NodeId,
        key: Key,
        right_child: NodeId,
        parent_id: NodeId,
    ) -> Result<(), BTreeError> {
        if parent_id == 0 {
            // No parent - need to create a new root
            self.create_new_root(left_child, key, right_child)?;
            return Ok(());
        }

        self.node_mut(right_child)?.header_mut().parent = parent_id;

        let parent = self.internal_mut(parent_id)?;
        if !parent.is_full() {
            parent.insert(key, right_child);
            return Ok(());
        }

        parent.insert(key, right_child);
        let (median_key, right_parent) = parent.split();
        let grandparent = parent.header.parent;
        let moved = right_parent.children.clone();

        let right_parent_id = self.allocate(Node::Internal(right_parent));
        for child_id in moved {
            self.node_mut(child_id)?.header_mut().parent = right_parent_id;
        }

        self.insert_into_parent(parent_id, median_key, right_parent_id, grandparent)
    }

    /// Create a new root node after the old root splits.
    fn create_new_root(
        &mut self,
        left_child: NodeId,
        key: Key,
        right_child: NodeId,
    ) -> Result<NodeId, BTreeError> {
        let new_root = InternalNode::with_children(0, left_child, key, right_child);
        let new_root_id = self.allocate(Node::Internal(new_root));

        self.node_mut(left_child)?.header_mut().parent = new_root_id;
        self.node_mut(right_child)?.header_mut().parent = new_root_id;
        self.root = new_root_id;

        Ok(new_root_id)
    }

    /// Depth of the tree, counting the leaf level.
    pub fn height(&self) -> Result<usize, BTreeError> {
        let mut height = 1;
        let mut current = self.root;
        loop {
            match self.node(current)? {
                Node::Leaf(_) => return Ok(height),
                Node::Internal(node) => {
                    current = node.children[0];
                    height += 1;
                }
            }
        }
    }
}

/// Iterator over B-tree entries in key order.
pub struct BTreeIterator<'a> {
    tree: &'a BTree,
    current: NodeId,
    index: usize,
}

impl<'a> BTreeIterator<'a> {
    /// Get the next entry.
    pub fn next_entry(&mut self) -> Result<Option<(&'a Key, &'a [u8])>, BTreeError> {
        let tree = self.tree;
        loop {
            if self.current == 0 {
                return Ok(None);
            }

            let leaf = tree.leaf(self.current)?;
            if let Some(entry) = leaf.entries.get(self.index) {
                self.index += 1;
                return Ok(Some((&entry.key, entry.value.as_slice())));
            }

            // Move to next leaf
            self.current = leaf.header.next_leaf;
            self.index = 0;
        }
    }
}

/// Errors that can occur during B-tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BTreeError {
    /// Node error.
    Node(NodeError),
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(e) => write!(f, "node error: {e}"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Node(e) => Some(e),
        }
    }
}

impl From<NodeError> for BTreeError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::node::make_key;

    fn key_for(i: u32) -> Key {
        make_key(&[&i.to_be_bytes()])
    }

    #[test]
    fn test_btree_basic_operations() {
        let mut tree = BTree::new();

        tree.insert(key_for(1), b"value1".to_vec()).expect("insert 1");
        tree.insert(key_for(2), b"value2".to_vec()).expect("insert 2");
        tree.insert(key_for(3), b"value3".to_vec()).expect("insert 3");

        assert_eq!(tree.get(&key_for(1)).expect("get 1"), Some(b"value1".as_slice()));
        assert_eq!(tree.get(&key_for(2)).expect("get 2"), Some(b"value2".as_slice()));
        assert_eq!(tree.get(&key_for(3)).expect("get 3"), Some(b"value3".as_slice()));
        assert_eq!(tree.get(&key_for(4)).expect("get 4"), None);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_btree_update() {
        let mut tree = BTree::new();
        let key = key_for(1);

        let old = tree.insert(key, b"original".to_vec()).expect("insert");
        assert!(old.is_none());

        let old = tree.insert(key, b"updated".to_vec()).expect("update");
        assert_eq!(old, Some(b"original".to_vec()));

        assert_eq!(tree.get(&key).expect("get"), Some(b"updated".as_slice()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_btree_remove() {
        let mut tree = BTree::new();
        let key = key_for(1);

        tree.insert(key, b"value".to_vec()).expect("insert");
        let removed = tree.remove(&key).expect("remove");
        assert_eq!(removed, Some(b"value".to_vec()));

        assert!(tree.get(&key).expect("get after remove").is_none());
        assert!(tree.remove(&key).expect("remove again").is_none());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_btree_rejects_oversized_value() {
        let mut tree = BTree::new();
        let err = tree
            .insert(key_for(1), vec![0; MAX_INLINE_VALUE_SIZE + 1])
            .expect_err("oversized");
        assert_eq!(
            err,
            BTreeError::Node(NodeError::ValueTooLarge(MAX_INLINE_VALUE_SIZE + 1))
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn test_btree_iteration() {
        let mut tree = BTree::new();

        for i in [5u32, 3, 7, 1, 9, 2, 8, 4, 6, 0] {
            tree.insert(key_for(i), vec![i as u8]).expect("insert");
        }

        let mut iter = tree.cursor().expect("cursor");
        let mut seen = Vec::new();
        while let Some((_, value)) = iter.next_entry().expect("next") {
            seen.push(value[0]);
        }

        assert_eq!(seen, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn test_btree_many_inserts() {
        let mut tree = BTree::new();

        // Enough entries to split internal nodes as well as leaves
        let n = 20_000u32;
        for i in (0..n).rev() {
            let value = format!("value_{i}").into_bytes();
            tree.insert(key_for(i), value).expect("insert");
        }

        assert_eq!(tree.len(), n as usize);
        assert_eq!(tree.count().expect("count"), n as usize);
        assert!(tree.height().expect("height") >= 3);

        for i in 0..n {
            let expected = format!("value_{i}").into_bytes();
            let actual = tree.get(&key_for(i)).expect("get");
            assert_eq!(actual, Some(expected.as_slice()), "mismatch at {i}");
        }

        let mut iter = tree.cursor().expect("cursor");
        let mut prev: Option<Key> = None;
        while let Some((key, _)) = iter.next_entry().expect("next") {
            if let Some(p) = prev {
                assert!(*key > p, "entries should be in sorted order");
            }
            prev = Some(*key);
        }
    }

    #[test]
    fn test_btree_large_values_split() {
        let mut tree = BTree::new();

        for i in 0..200u32 {
            let value = vec![(i % 256) as u8; MAX_INLINE_VALUE_SIZE];
            tree.insert(key_for(i), value).expect("insert");
        }

        assert!(tree.node_count() > 1);
        assert_eq!(tree.count().expect("count"), 200);
        assert_eq!(
            tree.get(&key_for(150)).expect("get").map(<[u8]>::len),
            Some(MAX_INLINE_VALUE_SIZE)
        );
    }

    #[test]
    fn test_btree_iter_from() {
        let mut tree = BTree::new();

        for i in 0..10u32 {
            tree.insert(key_for(i * 2), vec![i as u8]).expect("insert");
        }

        // Start between keys 4 and 6
        let mut iter = tree.iter_from(&key_for(5)).expect("iter_from");
        let mut values = Vec::new();
        while let Some((_, value)) = iter.next_entry().expect("next") {
            values.push(value[0]);
        }

        assert_eq!(values, vec![3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_btree_iteration_skips_emptied_leaves() {
        let mut tree = BTree::new();
        for i in 0..5_000u32 {
            tree.insert(key_for(i), vec![0; 16]).expect("insert");
        }
        for i in 1_000..4_000u32 {
            tree.remove(&key_for(i)).expect("remove");
        }

        let mut iter = tree.iter_from(&key_for(999)).expect("iter_from");
        let (first, _) = iter.next_entry().expect("next").expect("entry");
        let (second, _) = iter.next_entry().expect("next").expect("entry");
        assert_eq!(*first, key_for(999));
        assert_eq!(*second, key_for(4_000));
        assert_eq!(tree.count().expect("count"), 2_000);
    }
}
