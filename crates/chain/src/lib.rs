//! Blockchain orchestration for txchain.
//!
//! This crate keeps an append-only chain of [`Block`]s and answers
//! integrity questions about it:
//! - **Append**: link each new block to the tail's hash
//! - **Lookup**: resolve a transaction id to its block and leaf position
//! - **Verify**: check a transaction's Merkle path, a block hash, or the
//!   whole chain
//!
//! # Example
//!
//! ```rust
//! use txchain_chain::{Blockchain, BlockchainConfig};
//!
//! let mut chain = Blockchain::with_genesis(BlockchainConfig::default()).unwrap();
//!
//! let tx1 = chain.create_transaction("alice pays bob");
//! let tx2 = chain.create_transaction("bob pays carol");
//! let id = tx2.id().to_string();
//! chain.append(vec![tx1, tx2]).unwrap();
//!
//! assert!(chain.verify_transaction(&id).unwrap());
//! assert!(chain.verify_chain().unwrap().is_valid());
//! ```
//!
//! [`Block`]: txchain_core::Block

pub mod blockchain;

// Re-export commonly used types
pub use blockchain::{
    Blockchain, BlockchainConfig, BlockchainError, BlockchainStats, ChainReport, Result,
};
