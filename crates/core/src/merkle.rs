//! Merkle tree over an ordered set of hashable items.
//!
//! Nodes live in a single arena and refer to each other by [`NodeId`], so a
//! leaf can walk up to the root without the tree owning cycles.
//!
//! Padding follows two different rules:
//! - an odd leaf layer gets one extra leaf, a duplicate of the last item;
//! - an odd intermediate layer pairs its last node with itself.

use crate::hash::{hash_pair, Hash, HashError};
use thiserror::Error;

/// Errors that can occur while building or checking a Merkle tree.
#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("cannot build a merkle tree from zero items")]
    EmptyInput,
    #[error("hash computation failed: {0}")]
    HashComputationFailure(#[from] HashError),
    #[error("leaf index {index} out of range (tree has {len} leaves)")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, MerkleError>;

/// Something that can be placed in a Merkle tree.
pub trait Hashable {
    /// Deterministic hash of the item's canonical encoding.
    fn compute_hash(&self) -> std::result::Result<Hash, HashError>;

    /// Identifier used to locate the item among its siblings.
    fn identifier(&self) -> &str;
}

/// Position of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf {
        hash: Hash,
        /// Index of the wrapped item in the input sequence.
        item: usize,
        /// True for the padding leaf added to an odd leaf layer.
        is_duplicate: bool,
        parent: Option<NodeId>,
    },
    Internal {
        hash: Hash,
        left: NodeId,
        right: NodeId,
        parent: Option<NodeId>,
    },
}

impl Node {
    /// The hash stored on this node.
    pub fn hash(&self) -> &Hash {
        match self {
            Node::Leaf { hash, .. } | Node::Internal { hash, .. } => hash,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf { parent, .. } | Node::Internal { parent, .. } => *parent,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Node::Leaf { is_duplicate: true, .. })
    }

    fn set_parent(&mut self, id: NodeId) {
        match self {
            Node::Leaf { parent, .. } | Node::Internal { parent, .. } => *parent = Some(id),
        }
    }
}

/// An immutable Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    nodes: Vec<Node>,
    /// Leaf ids in order, padding leaf included.
    leaves: Vec<NodeId>,
    root: NodeId,
}

/// A merkle proof for a single leaf.
#[derive(Debug, Clone)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Hash,
    /// Sibling hashes from leaf to root.
    pub siblings: Vec<Hash>,
    /// Direction for each sibling (true = right, false = left).
    pub directions: Vec<bool>,
}

impl MerkleTree {
    /// Build a tree over `items`, preserving their order.
    pub fn build<T: Hashable>(items: &[T]) -> Result<Self> {
        if items.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let mut nodes = Vec::with_capacity(items.len() * 2 + 2);
        for (item, data) in items.iter().enumerate() {
            nodes.push(Node::Leaf {
                hash: data.compute_hash()?,
                item,
                is_duplicate: false,
                parent: None,
            });
        }

        if nodes.len() % 2 != 0 {
            let last = items.len() - 1;
            let hash = *nodes[last].hash();
            nodes.push(Node::Leaf {
                hash,
                item: last,
                is_duplicate: true,
                parent: None,
            });
        }

        let leaves: Vec<NodeId> = (0..nodes.len()).map(NodeId).collect();
        let mut layer = leaves.clone();

        // Every layer has at least two nodes here: the leaf layer was padded
        // to an even count, and the loop stops as soon as a layer has two.
        let root = loop {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));

            for pair in layer.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);

                let hash = hash_pair(nodes[left.0].hash(), nodes[right.0].hash());
                let id = NodeId(nodes.len());
                nodes.push(Node::Internal {
                    hash,
                    left,
                    right,
                    parent: None,
                });
                nodes[left.0].set_parent(id);
                nodes[right.0].set_parent(id);
                next.push(id);
            }

            if layer.len() == 2 {
                break next[0];
            }
            layer = next;
        };

        tracing::trace!(
            items = items.len(),
            leaves = leaves.len(),
            nodes = nodes.len(),
            "built merkle tree"
        );

        Ok(Self {
            nodes,
            leaves,
            root,
        })
    }

    /// Get the root of the merkle tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Hash stored on the root node.
    pub fn root_hash(&self) -> Hash {
        *self.nodes[self.root.0].hash()
    }

    /// Number of leaves, padding leaf included.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Leaf at `index`, if any.
    pub fn leaf(&self, index: usize) -> Option<&Node> {
        self.leaves.get(index).map(|id| &self.nodes[id.0])
    }

    /// Leaves in order.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> + '_ {
        self.leaves.iter().map(|id| &self.nodes[id.0])
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Total number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ancestors of the leaf at `index`, from its parent up to the root.
    pub fn path_to_root(&self, index: usize) -> Result<Vec<NodeId>> {
        let leaf = self.leaf_id(index)?;
        let mut path = Vec::new();
        let mut current = self.nodes[leaf.0].parent();
        while let Some(id) = current {
            path.push(id);
            current = self.nodes[id.0].parent();
        }
        Ok(path)
    }

    /// Recompute the hash of the subtree rooted at `id`.
    ///
    /// Leaves return their stored hash. Internal nodes ignore their own
    /// stored hash and rebuild it from their children, all the way down.
    pub fn recompute_hash(&self, id: NodeId) -> Hash {
        match &self.nodes[id.0] {
            Node::Leaf { hash, .. } => *hash,
            Node::Internal { left, right, .. } => {
                hash_pair(&self.recompute_hash(*left), &self.recompute_hash(*right))
            }
        }
    }

    /// Check every node on the path from leaf `index` to the root.
    ///
    /// Returns `Ok(false)` at the first node whose stored hash differs from
    /// the hash recomputed out of its children. Leaf hashes themselves are
    /// trusted; see [`MerkleTree::verify_leaf`].
    pub fn verify_path(&self, index: usize) -> Result<bool> {
        let leaf = self.leaf_id(index)?;

        let mut current = self.nodes[leaf.0].parent();
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            if let Node::Internal { hash, left, right, .. } = node {
                let combined =
                    hash_pair(&self.recompute_hash(*left), &self.recompute_hash(*right));
                if combined != *hash {
                    return Ok(false);
                }
            }
            current = node.parent();
        }

        Ok(true)
    }

    /// Check that `item` hashes to the stored leaf at `index`, then check the
    /// path above it.
    pub fn verify_leaf<T: Hashable>(&self, index: usize, item: &T) -> Result<bool> {
        let leaf = self.leaf_id(index)?;
        if item.compute_hash()? != *self.nodes[leaf.0].hash() {
            return Ok(false);
        }
        self.verify_path(index)
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Result<MerkleProof> {
        let leaf = self.leaf_id(index)?;

        let mut siblings = Vec::new();
        let mut directions = Vec::new();
        let mut current = leaf;

        while let Some(parent) = self.nodes[current.0].parent() {
            if let Node::Internal { left, right, .. } = self.nodes[parent.0] {
                // A self-paired node is its own sibling.
                let is_right = left == current;
                let sibling = if is_right { right } else { left };
                siblings.push(*self.nodes[sibling.0].hash());
                directions.push(is_right);
            }
            current = parent;
        }

        Ok(MerkleProof {
            leaf: *self.nodes[leaf.0].hash(),
            siblings,
            directions,
        })
    }

    /// Verify a merkle proof against this tree's root.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        verify_proof(&self.root_hash(), proof)
    }

    /// Flip the low bit of the hash stored on `id`, leaving its children
    /// untouched.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn flip_stored_hash(&mut self, id: NodeId) {
        match &mut self.nodes[id.0] {
            Node::Leaf { hash, .. } | Node::Internal { hash, .. } => hash.0[0] ^= 0x01,
        }
    }

    fn leaf_id(&self, index: usize) -> Result<NodeId> {
        self.leaves
            .get(index)
            .copied()
            .ok_or(MerkleError::IndexOutOfRange {
                index,
                len: self.leaves.len(),
            })
    }
}

/// Compute the merkle root of `items` without keeping the tree.
pub fn merkle_root<T: Hashable>(items: &[T]) -> Result<Hash> {
    MerkleTree::build(items).map(|tree| tree.root_hash())
}

/// Verify a merkle proof against a given root.
pub fn verify_proof(root: &Hash, proof: &MerkleProof) -> bool {
    let mut current = proof.leaf;

    for (sibling, is_right) in proof.siblings.iter().zip(proof.directions.iter()) {
        current = if *is_right {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        };
    }

    current == *root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    #[derive(Debug)]
    struct Item(String);

    impl Hashable for Item {
        fn compute_hash(&self) -> std::result::Result<Hash, HashError> {
            Ok(hash(self.0.as_bytes()))
        }

        fn identifier(&self) -> &str {
            &self.0
        }
    }

    struct Unhashable;

    impl Hashable for Unhashable {
        fn compute_hash(&self) -> std::result::Result<Hash, HashError> {
            Err(HashError::Encoding(Box::new(bincode::ErrorKind::SizeLimit)))
        }

        fn identifier(&self) -> &str {
            "unhashable"
        }
    }

    fn make_items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item(format!("item-{i}"))).collect()
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<Item> = Vec::new();
        assert!(matches!(MerkleTree::build(&items), Err(MerkleError::EmptyInput)));
    }

    #[test]
    fn test_hash_failure_propagates() {
        assert!(matches!(
            MerkleTree::build(&[Unhashable]),
            Err(MerkleError::HashComputationFailure(_))
        ));
    }

    #[test]
    fn test_recomputed_root_matches_stored() {
        for n in [1, 2, 3, 5, 8] {
            let tree = MerkleTree::build(&make_items(n)).unwrap();
            assert_eq!(tree.recompute_hash(tree.root()), tree.root_hash(), "n = {n}");
        }
    }

    #[test]
    fn test_single_item_pads_to_two_leaves() {
        let items = make_items(1);
        let tree = MerkleTree::build(&items).unwrap();
        let h = hash(items[0].0.as_bytes());

        assert_eq!(tree.leaf_count(), 2);
        assert!(tree.leaf(1).unwrap().is_duplicate());
        assert_eq!(tree.root_hash(), hash_pair(&h, &h));
    }

    #[test]
    fn test_odd_leaf_padding() {
        let tree = MerkleTree::build(&make_items(3)).unwrap();
        assert_eq!(tree.leaf_count(), 4);

        let third = tree.leaf(2).unwrap();
        let fourth = tree.leaf(3).unwrap();
        assert_eq!(third.hash(), fourth.hash());
        assert!(!third.is_duplicate());
        assert!(fourth.is_duplicate());
        assert_ne!(tree.leaves[2], tree.leaves[3]);
        assert!(matches!(fourth, Node::Leaf { item: 2, .. }));
    }

    #[test]
    fn test_intermediate_layer_self_pairs() {
        // 6 leaves -> 3 internal nodes -> last one paired with itself.
        let items = make_items(6);
        let tree = MerkleTree::build(&items).unwrap();
        let h: Vec<Hash> = items.iter().map(|i| i.compute_hash().unwrap()).collect();

        let a = hash_pair(&h[0], &h[1]);
        let b = hash_pair(&h[2], &h[3]);
        let c = hash_pair(&h[4], &h[5]);
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(tree.root_hash(), expected);
        assert_eq!(tree.leaf_count(), 6);

        let c_id = tree.node(tree.leaves[4]).parent().unwrap();
        let cc_id = tree.node(c_id).parent().unwrap();
        assert!(matches!(
            tree.node(cc_id),
            Node::Internal { left, right, .. } if *left == c_id && *right == c_id
        ));
    }

    #[test]
    fn test_padding_only_on_leaf_layer() {
        // 5 leaves pad to 6; the layer of 3 self-pairs instead of growing.
        let tree = MerkleTree::build(&make_items(5)).unwrap();
        assert_eq!(tree.leaf_count(), 6);
        assert_eq!(tree.leaves().filter(|n| n.is_duplicate()).count(), 1);
        // 6 leaves + 3 + 2 + 1 internal nodes.
        assert_eq!(tree.node_count(), 12);
    }

    #[test]
    fn test_root_has_no_parent() {
        let tree = MerkleTree::build(&make_items(8)).unwrap();
        assert_eq!(tree.node(tree.root()).parent(), None);
        for index in 0..tree.leaf_count() {
            let path = tree.path_to_root(index).unwrap();
            assert_eq!(path.len(), 3);
            assert_eq!(*path.last().unwrap(), tree.root());
        }
    }

    #[test]
    fn test_order_matters() {
        let items = make_items(2);
        let reversed = vec![Item(items[1].0.clone()), Item(items[0].0.clone())];
        assert_ne!(merkle_root(&items).unwrap(), merkle_root(&reversed).unwrap());
    }

    #[test]
    fn test_verify_path_untampered() {
        for n in [1, 2, 3, 5, 8, 13] {
            let tree = MerkleTree::build(&make_items(n)).unwrap();
            for index in 0..tree.leaf_count() {
                assert!(tree.verify_path(index).unwrap(), "n = {n}, index = {index}");
            }
        }
    }

    #[test]
    fn test_verify_path_index_out_of_range() {
        let tree = MerkleTree::build(&make_items(3)).unwrap();
        assert!(matches!(
            tree.verify_path(4),
            Err(MerkleError::IndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_tampered_ancestor_detected() {
        let clean = MerkleTree::build(&make_items(8)).unwrap();

        for index in 0..clean.leaf_count() {
            for ancestor in clean.path_to_root(index).unwrap() {
                let mut tree = clean.clone();
                tree.flip_stored_hash(ancestor);
                assert!(!tree.verify_path(index).unwrap());
            }
        }
    }

    #[test]
    fn test_tampering_does_not_affect_unrelated_paths() {
        let mut tree = MerkleTree::build(&make_items(8)).unwrap();
        // Parent of leaves 0 and 1.
        let target = tree.node(tree.leaves[0]).parent().unwrap();
        tree.flip_stored_hash(target);

        assert!(!tree.verify_path(0).unwrap());
        assert!(!tree.verify_path(1).unwrap());
        for index in 2..8 {
            assert!(tree.verify_path(index).unwrap(), "index = {index}");
        }
    }

    #[test]
    fn test_tampered_leaf_detected_by_parent() {
        let mut tree = MerkleTree::build(&make_items(4)).unwrap();
        let leaf = tree.leaves[2];
        tree.flip_stored_hash(leaf);

        assert!(!tree.verify_path(2).unwrap());
        assert!(!tree.verify_path(3).unwrap());
        // Root now disagrees with the recomputed subtree too.
        assert!(!tree.verify_path(0).unwrap());
    }

    #[test]
    fn test_verify_leaf() {
        let items = make_items(5);
        let tree = MerkleTree::build(&items).unwrap();

        assert!(tree.verify_leaf(3, &items[3]).unwrap());
        assert!(!tree.verify_leaf(3, &items[2]).unwrap());
        assert!(tree.verify_leaf(5, &items[4]).unwrap());
    }

    #[test]
    fn test_merkle_proof_valid() {
        for n in [1, 2, 3, 5, 6, 8] {
            let tree = MerkleTree::build(&make_items(n)).unwrap();
            for index in 0..tree.leaf_count() {
                let proof = tree.proof(index).unwrap();
                assert!(tree.verify_proof(&proof), "n = {n}, index = {index}");
            }
        }
    }

    #[test]
    fn test_merkle_proof_invalid_index() {
        let tree = MerkleTree::build(&make_items(4)).unwrap();
        assert!(tree.proof(10).is_err());
    }

    #[test]
    fn test_merkle_proof_wrong_root() {
        let tree = MerkleTree::build(&make_items(4)).unwrap();
        let proof = tree.proof(0).unwrap();

        let wrong_root = hash(b"wrong");
        assert!(!verify_proof(&wrong_root, &proof));
    }

    #[test]
    fn test_identifier() {
        let items = make_items(1);
        assert_eq!(items[0].identifier(), "item-0");
    }
}
