//! Block and block header structures.

use crate::clock;
use crate::hash::{hash, Hash};
use crate::merkle::{MerkleTree, Result};
use crate::transaction::Transaction;
use std::fmt;

/// Payload of the synthetic transaction in the genesis block.
pub const GENESIS_DATA: &str = "Genesis Block";

/// The fields a block hash commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Creation time in microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Merkle root of transactions.
    pub merkle_root: Hash,
    /// Hash of the previous block (None for genesis).
    pub prev_hash: Option<Hash>,
}

impl BlockHeader {
    /// Canonical header bytes: decimal ASCII timestamp, then the 32 root
    /// bytes, then the previous hash (nothing at all for genesis).
    pub fn encode(&self) -> Vec<u8> {
        let mut record = self.timestamp.to_string().into_bytes();
        record.extend_from_slice(self.merkle_root.as_ref());
        if let Some(prev) = &self.prev_hash {
            record.extend_from_slice(prev.as_ref());
        }
        record
    }

    /// Calculate the hash of this block header.
    pub fn hash(&self) -> Hash {
        hash(&self.encode())
    }
}

/// A sealed block. Nothing in it changes after [`Block::create`].
#[derive(Debug, Clone)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    merkle_tree: MerkleTree,
    hash: Hash,
}

impl Block {
    /// Build the Merkle tree, stamp the block and seal its hash.
    pub fn create(transactions: Vec<Transaction>, prev_hash: Option<Hash>) -> Result<Self> {
        let merkle_tree = MerkleTree::build(&transactions)?;
        let header = BlockHeader {
            timestamp: clock::next_micros(),
            merkle_root: merkle_tree.root_hash(),
            prev_hash,
        };
        let hash = header.hash();

        Ok(Self {
            header,
            transactions,
            merkle_tree,
            hash,
        })
    }

    /// Create the genesis block around its single synthetic transaction.
    pub fn genesis(transaction: Transaction) -> Result<Self> {
        Self::create(vec![transaction], None)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn prev_hash(&self) -> Option<&Hash> {
        self.header.prev_hash.as_ref()
    }

    pub fn merkle_root(&self) -> &Hash {
        &self.header.merkle_root
    }

    /// Get the block hash.
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.merkle_tree
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn merkle_tree_mut(&mut self) -> &mut MerkleTree {
        &mut self.merkle_tree
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.header.prev_hash.is_none()
    }

    /// Rebuild the tree from the current transactions and recompute the hash.
    ///
    /// Returns `Ok(false)` if the result no longer matches the sealed hash.
    pub fn verify(&self) -> Result<bool> {
        let tree = MerkleTree::build(&self.transactions)?;
        let header = BlockHeader {
            merkle_root: tree.root_hash(),
            ..self.header.clone()
        };
        Ok(header.hash() == self.hash)
    }

    /// Position of the transaction with `id`, if this block holds it.
    pub fn find_transaction_index(&self, id: &str) -> Option<usize> {
        self.transactions.iter().position(|tx| tx.id() == id)
    }

    /// Verify the Merkle path of the transaction with `id`.
    ///
    /// `Ok(None)` means the block does not contain that transaction.
    pub fn verify_transaction(&self, id: &str) -> Result<Option<bool>> {
        match self.find_transaction_index(id) {
            Some(index) => self.merkle_tree.verify_path(index).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timestamp: {}", self.header.timestamp)?;
        writeln!(f, "Contains: {} transactions", self.transactions.len())?;
        writeln!(
            f,
            "Prev. hash: {}",
            self.header.prev_hash.map(|h| h.to_hex()).unwrap_or_default()
        )?;
        writeln!(f, "Hash: {}", self.hash)
    }
}
