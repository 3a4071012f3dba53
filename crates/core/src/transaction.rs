//! Transaction records.

use crate::clock;
use crate::hash::{hash, Hash, HashError};
use crate::merkle::Hashable;
use crate::txid::{self, TxId, TxIdError};
use serde::{Deserialize, Serialize};

/// A transaction: an opaque payload under a timestamped id.
///
/// The canonical encoding used for hashing is the bincode encoding of the
/// struct, fields in declaration order: `id` then `payload`, each prefixed
/// with its length as a little-endian `u64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    payload: Vec<u8>,
}

impl Transaction {
    /// Wrap an existing id and payload.
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// Create a transaction stamped with a fresh id.
    pub fn create(payload: impl Into<Vec<u8>>) -> Self {
        Self::create_with_suffix_len(payload, txid::DEFAULT_SUFFIX_BYTES)
    }

    /// Create a transaction whose id carries `suffix_bytes` random bytes.
    pub fn create_with_suffix_len(payload: impl Into<Vec<u8>>, suffix_bytes: usize) -> Self {
        let id = TxId::generate(clock::next_micros(), suffix_bytes);
        Self::new(id.to_string(), payload)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Creation timestamp embedded in the id.
    pub fn timestamp(&self) -> Result<u64, TxIdError> {
        txid::timestamp_of(&self.id)
    }

    /// Canonical bytes fed to the hash function.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, HashError> {
        Ok(bincode::serialize(self)?)
    }

    /// Get the transaction hash.
    pub fn hash(&self) -> Result<Hash, HashError> {
        Ok(hash(&self.canonical_bytes()?))
    }

    #[cfg(test)]
    pub(crate) fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }
}

impl Hashable for Transaction {
    fn compute_hash(&self) -> Result<Hash, HashError> {
        self.hash()
    }

    fn identifier(&self) -> &str {
        &self.id
    }
}
