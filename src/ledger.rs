//! Ledger: the ordered block sequence, balance accounting, block admission
//! and whole-chain validation.

use crate::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::error::ChainError;
use crate::transaction::NETWORK_SENDER;

/// Implicit stake credited to every identity before any chain history is
/// applied. A simplifying faucet semantic, not an issuance rule.
pub const STARTING_BALANCE: f64 = 100.0;

/// A single linear chain of blocks plus the global mining difficulty.
///
/// Shared mutable state of the node: callers wrap a `Ledger` in a lock and
/// keep every read-then-decide-then-write sequence (admission, replacement)
/// inside one critical section.
pub struct Ledger {
    pub blocks: Vec<Block>,
    /// Required leading zero hex digits of every block hash.
    pub difficulty: usize,
}

impl Ledger {
    /// Create an empty ledger. The chain has no genesis block; the first
    /// mined block links to [`GENESIS_PREVIOUS_HASH`].
    pub fn new(difficulty: usize) -> Self {
        Ledger {
            blocks: Vec::new(),
            difficulty,
        }
    }

    /// Hash the next block should link to.
    pub fn tip_hash(&self) -> String {
        self.blocks
            .last()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Derive a balance from the full chain history. Every identity starts
    /// at [`STARTING_BALANCE`]; transactions are applied in chain order.
    ///
    /// Recomputed on every call. O(chain length x block size) per query,
    /// acceptable while chains stay small; an incremental balance index is
    /// the first thing to add when that stops being true.
    pub fn balance_of(&self, address: &str) -> f64 {
        let mut balance = STARTING_BALANCE;
        for block in &self.blocks {
            for tx in &block.transactions {
                if tx.sender == address {
                    balance -= tx.amount;
                }
                if tx.recipient == address {
                    balance += tx.amount;
                }
            }
        }
        balance
    }

    /// Admit a candidate block: verify every transaction and check sender
    /// balances against the committed chain, then mine at the current
    /// difficulty and append. On failure the ledger is unchanged.
    ///
    /// Balances are checked per transaction against the committed chain
    /// only; no running balance is kept across the candidate's own
    /// transactions, so a block can jointly overdraw a sender even though
    /// each transaction individually looks affordable.
    pub fn add_block(&mut self, mut block: Block) -> Result<(), ChainError> {
        for tx in &block.transactions {
            if !tx.verify() {
                return Err(ChainError::InvalidTransaction(format!(
                    "Signature verification failed for: {}",
                    tx
                )));
            }
            if tx.sender != NETWORK_SENDER {
                let balance = self.balance_of(&tx.sender);
                if balance < tx.amount {
                    return Err(ChainError::InsufficientFunds(format!(
                        "sender has {} but tried to send {}",
                        balance, tx.amount
                    )));
                }
            }
        }

        block.mine(self.difficulty);
        self.blocks.push(block);
        Ok(())
    }

    /// Whole-chain validation predicate at the given difficulty.
    ///
    /// An empty chain is vacuously valid. For every block after the first:
    /// the stored hash must recompute, must link to the predecessor, must
    /// meet the difficulty target, and every transaction must verify. The
    /// first block is not independently re-validated.
    pub fn is_chain_valid(chain: &[Block], difficulty: usize) -> bool {
        for i in 1..chain.len() {
            let current = &chain[i];
            if current.hash != current.compute_hash() {
                return false;
            }
            if current.previous_hash != chain[i - 1].hash {
                return false;
            }
            if !Block::meets_target(&current.hash, difficulty) {
                return false;
            }
            if !current.transactions.iter().all(|tx| tx.verify()) {
                return false;
            }
        }
        true
    }

    /// Longest-chain rule: adopt the candidate iff it validates and is
    /// strictly longer than the local chain. Returns whether it was adopted.
    pub fn replace_if_longer(&mut self, candidate: Vec<Block>) -> bool {
        if Self::is_chain_valid(&candidate, self.difficulty)
            && candidate.len() > self.blocks.len()
        {
            self.blocks = candidate;
            true
        } else {
            false
        }
    }
}
