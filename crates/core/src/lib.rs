//! Core integrity primitives for txchain.
//!
//! This crate provides the building blocks of a tamper-evident ledger:
//! - SHA-256 hashing
//! - Transaction records and their timestamped identifiers
//! - Arena-backed Merkle trees with path verification and proofs
//! - Blocks whose hash chains timestamp, Merkle root and previous hash

pub mod block;
pub mod clock;
pub mod hash;
pub mod merkle;
pub mod transaction;
pub mod txid;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockHeader, GENESIS_DATA};
pub use hash::{hash, hash_concat, hash_pair, Hash, HashError};
pub use merkle::{
    merkle_root, verify_proof, Hashable, MerkleError, MerkleProof, MerkleTree, Node, NodeId,
};
pub use transaction::Transaction;
pub use txid::{TxId, TxIdError};
