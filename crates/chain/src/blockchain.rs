//! Main blockchain container.
//!
//! Blocks are appended at the tail only and never change afterwards. Lookups
//! by transaction id rely on block timestamps increasing along the chain and
//! on every transaction being stamped before the block that includes it; the
//! shared clock in `txchain_core::clock` guarantees both for sequential use
//! within one process.

use thiserror::Error;
use tracing::{debug, info, warn};
use txchain_core::{txid, Block, Hash, MerkleError, Transaction, TxIdError, GENESIS_DATA};

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("transaction {0} not found in the blockchain")]
    NotFound(String),

    #[error("malformed transaction id: {0}")]
    MalformedId(#[from] TxIdError),

    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("block index {index} out of range (chain has {len} blocks)")]
    BlockIndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Blockchain configuration.
#[derive(Debug, Clone)]
pub struct BlockchainConfig {
    /// Payload of the genesis block's synthetic transaction.
    pub genesis_data: String,
    /// Random bytes in the suffix of generated transaction ids, genesis
    /// transaction included.
    pub id_suffix_bytes: usize,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            genesis_data: GENESIS_DATA.to_string(),
            id_suffix_bytes: txid::DEFAULT_SUFFIX_BYTES,
        }
    }
}

/// An ordered, append-only sequence of blocks.
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    blocks: Vec<Block>,
    config: BlockchainConfig,
}

impl Blockchain {
    /// Create an empty chain. The first append creates the genesis block.
    pub fn new(config: BlockchainConfig) -> Self {
        Self {
            blocks: Vec::new(),
            config,
        }
    }

    /// Create a chain that already holds its genesis block.
    pub fn with_genesis(config: BlockchainConfig) -> Result<Self> {
        let mut chain = Self::new(config);
        chain.push_genesis()?;
        Ok(chain)
    }

    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Create a transaction with an id shaped by this chain's config.
    pub fn create_transaction(&self, payload: impl Into<Vec<u8>>) -> Transaction {
        Transaction::create_with_suffix_len(payload, self.config.id_suffix_bytes)
    }

    /// Append a block holding `transactions`, linked to the current tail.
    ///
    /// On an empty chain this creates the genesis block instead and the
    /// supplied transactions are not stored.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> Result<&Block> {
        let Some(tail) = self.blocks.last() else {
            if !transactions.is_empty() {
                warn!(
                    dropped = transactions.len(),
                    "chain is empty, creating genesis block instead"
                );
            }
            return self.push_genesis();
        };

        let block = Block::create(transactions, Some(*tail.hash()))?;
        info!(
            height = self.blocks.len(),
            hash = %block.hash(),
            txs = block.tx_count(),
            "appended block"
        );
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    fn push_genesis(&mut self) -> Result<&Block> {
        let genesis_tx = self.create_transaction(self.config.genesis_data.as_bytes());
        let genesis = Block::genesis(genesis_tx)?;
        info!(hash = %genesis.hash(), "created genesis block");
        self.blocks.push(genesis);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Number of blocks in the chain.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Get a block by height.
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Get the latest block.
    pub fn tail(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// First block stamped no earlier than the transaction's embedded
    /// timestamp, with its height.
    pub fn find_block_containing(&self, tx_id: &str) -> Result<Option<(usize, &Block)>> {
        let timestamp = txid::timestamp_of(tx_id)?;
        Ok(self
            .blocks
            .iter()
            .enumerate()
            .find(|(_, block)| block.timestamp() >= timestamp))
    }

    /// Check the Merkle path of the transaction with `tx_id`.
    ///
    /// `NotFound` means there was nothing to check; `Ok(false)` means the
    /// path was checked and did not match.
    pub fn verify_transaction(&self, tx_id: &str) -> Result<bool> {
        let (height, block) = self
            .find_block_containing(tx_id)?
            .ok_or_else(|| BlockchainError::NotFound(tx_id.to_string()))?;

        let index = block
            .find_transaction_index(tx_id)
            .ok_or_else(|| BlockchainError::NotFound(tx_id.to_string()))?;

        debug!(tx_id, height, index, "verifying transaction path");
        let valid = block.merkle_tree().verify_path(index)?;
        if !valid {
            warn!(tx_id, height, index, "merkle path mismatch");
        }
        Ok(valid)
    }

    /// Recompute the hash of the block at `index`.
    pub fn verify_block(&self, index: usize) -> Result<bool> {
        let block = self
            .blocks
            .get(index)
            .ok_or(BlockchainError::BlockIndexOutOfRange {
                index,
                len: self.blocks.len(),
            })?;

        let valid = block.verify()?;
        if !valid {
            warn!(height = index, hash = %block.hash(), "block hash mismatch");
        }
        Ok(valid)
    }

    /// Verify every block and every link between consecutive blocks.
    pub fn verify_chain(&self) -> Result<ChainReport> {
        for (height, block) in self.blocks.iter().enumerate() {
            let linked = match height {
                0 => block.is_genesis(),
                _ => block.prev_hash() == Some(self.blocks[height - 1].hash()),
            };
            if !linked {
                warn!(height, "broken link to previous block");
                return Ok(ChainReport::broken(height));
            }
            if !self.verify_block(height)? {
                return Ok(ChainReport::broken(height));
            }
        }

        Ok(ChainReport {
            blocks_checked: self.blocks.len(),
            first_invalid: None,
        })
    }

    /// Get blockchain statistics.
    pub fn stats(&self) -> BlockchainStats {
        let tail = self.blocks.last();
        BlockchainStats {
            height: self.blocks.len().saturating_sub(1),
            latest_block_hash: tail.map(|b| *b.hash()),
            latest_timestamp: tail.map(|b| b.timestamp()),
            transaction_count: self.blocks.iter().map(|b| b.tx_count()).sum(),
        }
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}

/// Outcome of [`Blockchain::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Blocks examined before stopping.
    pub blocks_checked: usize,
    /// Height of the first block that failed, if any.
    pub first_invalid: Option<usize>,
}

impl ChainReport {
    fn broken(height: usize) -> Self {
        Self {
            blocks_checked: height + 1,
            first_invalid: Some(height),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.first_invalid.is_none()
    }
}

/// Blockchain statistics.
#[derive(Debug, Clone)]
pub struct BlockchainStats {
    /// Height of the tail block (0 for genesis or an empty chain).
    pub height: usize,
    /// Hash of the latest block.
    pub latest_block_hash: Option<Hash>,
    /// Timestamp of the latest block.
    pub latest_timestamp: Option<u64>,
    /// Transactions across all blocks.
    pub transaction_count: usize,
}
