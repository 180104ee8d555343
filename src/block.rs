//! Block structure, hashing and proof-of-work for tinyledger

use crate::transaction::Transaction;
use sha2::{Digest, Sha256};

/// Previous-hash sentinel for the first block of a chain.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Version of the serialized block/transaction model. Shared by the wire
/// envelope and the persistence layer so a stored chain and a received chain
/// are the same format.
pub const CHAIN_FORMAT_VERSION: u32 = 1;

/// An ordered container of transactions with a content hash and a
/// proof-of-work nonce.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// Hex digest of the predecessor, or [`GENESIS_PREVIOUS_HASH`].
    pub previous_hash: String,
    /// Order-significant: the sequence feeds the hash.
    pub transactions: Vec<Transaction>,
    /// Creation instant in milliseconds. Fixed before mining starts, so the
    /// search space is purely over the nonce.
    pub timestamp: u64,
    pub nonce: u64,
    /// Hex SHA-256 over previous hash, timestamp, nonce and transactions.
    pub hash: String,
}

impl Block {
    pub fn new(previous_hash: String, transactions: Vec<Transaction>) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let mut block = Block {
            previous_hash,
            transactions,
            timestamp,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Recompute the content hash. Pure; does not mutate the nonce.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.timestamp.to_string().as_bytes());
        hasher.update(self.nonce.to_string().as_bytes());
        for tx in &self.transactions {
            hasher.update(tx.canonical_record().as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// True when the leading `difficulty` hex characters of `hash` are '0'.
    pub fn meets_target(hash: &str, difficulty: usize) -> bool {
        hash.len() >= difficulty && hash.chars().take(difficulty).all(|c| c == '0')
    }

    /// Increment the nonce and rehash until the difficulty target is met.
    /// CPU-bound and unbounded; runs to completion. A difficulty of zero is
    /// a no-op because the initial hash already meets the empty target.
    pub fn mine(&mut self, difficulty: usize) {
        while !Self::meets_target(&self.hash, difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }
}
