//! Transaction identifier codec.
//!
//! An id has the form `<decimal-microsecond-timestamp>+<hex-random-suffix>`.
//! Block lookup only ever needs the leading timestamp; the suffix is opaque.

use rand::RngCore;
use std::fmt;
use std::num::ParseIntError;
use thiserror::Error;

/// Separator between the timestamp and the random suffix.
pub const SEPARATOR: char = '+';

/// Default number of random bytes in a freshly generated suffix.
pub const DEFAULT_SUFFIX_BYTES: usize = 8;

/// Errors that can occur while decoding a transaction id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxIdError {
    #[error("transaction id {0:?} has no '+' separator")]
    MissingSeparator(String),
    #[error("transaction id timestamp is not a decimal integer: {0}")]
    InvalidTimestamp(#[from] ParseIntError),
}

/// A decoded transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxId {
    /// Creation time in microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Hex-encoded random suffix, kept verbatim.
    pub suffix: String,
}

impl TxId {
    /// Create an id for `timestamp` with `suffix_bytes` random bytes.
    pub fn generate(timestamp: u64, suffix_bytes: usize) -> Self {
        let mut bytes = vec![0u8; suffix_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            timestamp,
            suffix: hex::encode(bytes),
        }
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.timestamp, SEPARATOR, self.suffix)
    }
}

/// Encode a timestamp and raw suffix bytes into an id string.
pub fn encode(timestamp: u64, suffix: &[u8]) -> String {
    format!("{}{}{}", timestamp, SEPARATOR, hex::encode(suffix))
}

/// Decode an id string into its timestamp and suffix.
pub fn decode(id: &str) -> Result<TxId, TxIdError> {
    let (timestamp, suffix) = id
        .split_once(SEPARATOR)
        .ok_or_else(|| TxIdError::MissingSeparator(id.to_string()))?;

    Ok(TxId {
        timestamp: timestamp.parse()?,
        suffix: suffix.to_string(),
    })
}

/// Extract only the embedded creation timestamp.
pub fn timestamp_of(id: &str) -> Result<u64, TxIdError> {
    decode(id).map(|tx_id| tx_id.timestamp)
}
