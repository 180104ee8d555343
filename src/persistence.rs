//! Database persistence layer for tinyledger
//!
//! Stores the full chain, one row per block, with the transaction list in
//! the same serde model the sync protocol puts on the wire. The format
//! version lives in the metadata table.

use crate::block::{Block, CHAIN_FORMAT_VERSION};
use crate::error::ChainError;
use crate::transaction::Transaction;
use rusqlite::{params, Connection};
use std::sync::Mutex;

/// Abstraction for persistence backends. `save_chain` replaces any stored
/// chain atomically; `load_chain` returns `None` when no prior state exists.
pub trait Persistence: Send + Sync {
    fn save_chain(&self, blocks: &[Block]) -> Result<(), ChainError>;
    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                height INTEGER PRIMARY KEY,
                hash TEXT NOT NULL,
                previous_hash TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                nonce INTEGER NOT NULL,
                transactions TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            ChainError::DatabaseError(format!("Failed to create metadata table: {}", e))
        })?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }
}

impl Persistence for Database {
    /// Atomically replace the stored chain with the given block sequence.
    fn save_chain(&self, blocks: &[Block]) -> Result<(), ChainError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute("DELETE FROM blocks", [])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to clear blocks: {}", e)))?;

        for (height, block) in blocks.iter().enumerate() {
            let transactions_json = serde_json::to_string(&block.transactions).map_err(|e| {
                ChainError::DatabaseError(format!("Failed to serialize transactions: {}", e))
            })?;

            tx.execute(
                "INSERT INTO blocks (height, hash, previous_hash, timestamp, nonce, transactions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    height as i64,
                    block.hash,
                    block.previous_hash,
                    block.timestamp as i64,
                    block.nonce as i64,
                    transactions_json,
                ],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('format_version', ?1)",
            params![CHAIN_FORMAT_VERSION.to_string()],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save format version: {}", e)))?;

        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;

        let stored_version: Option<String> = conn_guard
            .query_row(
                "SELECT value FROM metadata WHERE key = 'format_version'",
                [],
                |row| row.get(0),
            )
            .ok();
        if let Some(version) = stored_version {
            if version != CHAIN_FORMAT_VERSION.to_string() {
                return Err(ChainError::DatabaseError(format!(
                    "Unsupported chain format version {} (expected {})",
                    version, CHAIN_FORMAT_VERSION
                )));
            }
        }

        let mut stmt = conn_guard
            .prepare(
                "SELECT hash, previous_hash, timestamp, nonce, transactions
                 FROM blocks ORDER BY height ASC",
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let blocks_iter = stmt
            .query_map([], |row| {
                let hash: String = row.get(0)?;
                let previous_hash: String = row.get(1)?;
                let timestamp: i64 = row.get(2)?;
                let nonce: i64 = row.get(3)?;
                let transactions_json: String = row.get(4)?;
                let transactions: Vec<Transaction> = serde_json::from_str(&transactions_json)
                    .map_err(|_e| rusqlite::Error::InvalidQuery)?;

                Ok(Block {
                    previous_hash,
                    transactions,
                    timestamp: timestamp as u64,
                    nonce: nonce as u64,
                    hash,
                })
            })
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for block_result in blocks_iter {
            blocks.push(
                block_result
                    .map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))?,
            );
        }

        if blocks.is_empty() {
            Ok(None)
        } else {
            Ok(Some(blocks))
        }
    }
}

/// Simple in-memory persistence implementation useful for tests and as a
/// fallback when the database cannot be opened.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    chain: std::sync::Arc<Mutex<Option<Vec<Block>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_chain(&self, blocks: &[Block]) -> Result<(), ChainError> {
        let mut chain = self
            .chain
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        *chain = Some(blocks.to_vec());
        Ok(())
    }

    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError> {
        let chain = self
            .chain
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(chain.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GENESIS_PREVIOUS_HASH;
    use crate::transaction::{Transaction, NETWORK_SENDER};

    fn sample_chain() -> Vec<Block> {
        let tx = Transaction::new(NETWORK_SENDER.to_string(), "alice".to_string(), 10.0);
        let mut first = Block::new(GENESIS_PREVIOUS_HASH.to_string(), vec![tx]);
        first.mine(1);
        let mut second = Block::new(first.hash.clone(), vec![]);
        second.mine(1);
        vec![first, second]
    }

    #[test]
    fn test_load_absent_returns_none() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.load_chain().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let db = Database::open(":memory:").unwrap();
        let chain = sample_chain();

        db.save_chain(&chain).unwrap();
        let loaded = db.load_chain().unwrap().unwrap();
        assert_eq!(loaded, chain);
    }

    #[test]
    fn test_save_replaces_previous_chain() {
        let db = Database::open(":memory:").unwrap();
        let chain = sample_chain();

        db.save_chain(&chain).unwrap();
        db.save_chain(&chain[..1]).unwrap();

        let loaded = db.load_chain().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_database_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chain.db");
        let chain = sample_chain();

        {
            let db = Database::open(path.to_str().unwrap()).unwrap();
            db.save_chain(&chain).unwrap();
        }

        let db = Database::open(path.to_str().unwrap()).unwrap();
        let loaded = db.load_chain().unwrap().unwrap();
        assert_eq!(loaded, chain);
    }

    #[test]
    fn test_in_memory_round_trip() {
        let store = InMemoryPersistence::new();
        assert!(store.load_chain().unwrap().is_none());

        let chain = sample_chain();
        store.save_chain(&chain).unwrap();
        assert_eq!(store.load_chain().unwrap().unwrap(), chain);
    }
}
