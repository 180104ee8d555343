//! Node orchestration: wiring config, wallet, ledger, persistence and the
//! sync protocol together, plus the operations the operator surface maps to.

use crate::block::Block;
use crate::config::Config;
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::persistence::{Database, InMemoryPersistence, Persistence};
use crate::sync::{NetworkNode, SyncOutcome};
use crate::wallet::Wallet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct Node {
    pub config: Config,
    pub wallet: Wallet,
    pub ledger: Arc<RwLock<Ledger>>,
    pub persistence: Arc<Box<dyn Persistence>>,
    pub network: Arc<NetworkNode>,
}

impl Node {
    /// Build a node from its config: generate the wallet (fatal on failure,
    /// no identity means no node), open persistence with an in-memory
    /// fallback, and seed the ledger from disk when the stored chain passes
    /// validation.
    pub fn init(config: Config) -> Result<Self, ChainError> {
        let wallet = Wallet::new()?;
        info!(
            "Wallet address: {}...",
            wallet.identity.chars().take(15).collect::<String>()
        );

        let db_path = std::path::Path::new(&config.storage.path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let persistence_box: Box<dyn Persistence> = match Database::open(&config.storage.path) {
            Ok(db) => Box::new(db),
            Err(e) => {
                warn!(
                    "Failed to open DB at {}: {}. Falling back to in-memory persistence.",
                    config.storage.path, e
                );
                Box::new(InMemoryPersistence::new())
            }
        };
        let persistence = Arc::new(persistence_box);

        let mut ledger = Ledger::new(config.chain.difficulty);
        match persistence.load_chain() {
            Ok(Some(blocks)) => {
                if Ledger::is_chain_valid(&blocks, ledger.difficulty) {
                    info!("Valid chain loaded from disk ({} blocks)", blocks.len());
                    ledger.blocks = blocks;
                } else {
                    warn!("Stored chain failed validation; starting from an empty chain");
                }
            }
            Ok(None) => info!("No stored chain; starting from an empty chain"),
            Err(e) => warn!("Failed to load chain: {}. Starting from an empty chain.", e),
        }

        let ledger = Arc::new(RwLock::new(ledger));
        let network = Arc::new(NetworkNode::new(ledger.clone(), persistence.clone()));

        Ok(Node {
            config,
            wallet,
            ledger,
            persistence,
            network,
        })
    }

    /// Start the responder loop and dial the bootstrap peers.
    pub async fn start(self: Arc<Self>) {
        let network = self.network.clone();
        let port = self.config.network.p2p_port;
        tokio::spawn(async move {
            if let Err(e) = network.start_server(port).await {
                error!("P2P server failed: {}", e);
            }
        });
        // give the listener a moment to bind
        tokio::time::sleep(Duration::from_millis(200)).await;

        for peer in &self.config.network.bootstrap_peers {
            match parse_peer_addr(peer) {
                Some((host, port)) => {
                    let node = self.clone();
                    tokio::spawn(async move {
                        match node.sync_with(&host, port).await {
                            Ok(outcome) => info!("Bootstrap sync with {}:{}: {:?}", host, port, outcome),
                            Err(e) => warn!("Bootstrap sync with {}:{} failed: {}", host, port, e),
                        }
                    });
                }
                None => warn!("Ignoring malformed bootstrap peer {:?}", peer),
            }
        }
    }

    /// Mine one block carrying a single transfer signed by this node's
    /// wallet. Admission, mining and the append run under the ledger write
    /// lock, serialized against chain replacement; the proof-of-work search
    /// is moved off the async worker with `block_in_place`.
    pub async fn mine_transfer(&self, recipient: &str, amount: f64) -> Result<String, ChainError> {
        let tx = self.wallet.create_transfer(recipient, amount)?;

        let mut ledger = self.ledger.write().await;
        let block = Block::new(ledger.tip_hash(), vec![tx]);
        tokio::task::block_in_place(|| ledger.add_block(block))?;

        let hash = ledger.tip_hash();
        info!("Mined block {}", hash);
        if let Err(e) = self.persistence.save_chain(&ledger.blocks) {
            // In-memory ledger stays authoritative; not retried.
            warn!("Failed to persist chain: {}", e);
        }
        Ok(hash)
    }

    /// Pull a peer's chain and adopt it when strictly longer and valid.
    pub async fn sync_with(&self, host: &str, port: u16) -> Result<SyncOutcome, ChainError> {
        self.network.connect_peer(host, port).await
    }

    pub async fn balance_of(&self, address: &str) -> f64 {
        self.ledger.read().await.balance_of(address)
    }

    pub async fn own_balance(&self) -> f64 {
        self.balance_of(&self.wallet.identity).await
    }

    /// One summary line per block, oldest first.
    pub async fn block_summaries(&self) -> Vec<String> {
        let ledger = self.ledger.read().await;
        ledger
            .blocks
            .iter()
            .map(|b| {
                let short_hash: String = b.hash.chars().take(10).collect();
                format!(
                    "Hash: {}... | Transactions: {}",
                    short_hash,
                    b.transactions.len()
                )
            })
            .collect()
    }

    /// Flush the current chain to disk, reporting failure to the operator.
    pub async fn save(&self) -> Result<(), ChainError> {
        let ledger = self.ledger.read().await;
        self.persistence.save_chain(&ledger.blocks)
    }
}

fn parse_peer_addr(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainConfig, Config, NetworkConfig, StorageConfig};
    use crate::ledger::STARTING_BALANCE;

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            network: NetworkConfig {
                p2p_port: 0,
                bootstrap_peers: Vec::new(),
            },
            storage: StorageConfig {
                path: dir
                    .path()
                    .join("chain.db")
                    .to_string_lossy()
                    .into_owned(),
            },
            chain: ChainConfig { difficulty: 1 },
        }
    }

    #[test]
    fn test_parse_peer_addr() {
        assert_eq!(
            parse_peer_addr("127.0.0.1:9341"),
            Some(("127.0.0.1".to_string(), 9341))
        );
        assert_eq!(parse_peer_addr("no-port"), None);
        assert_eq!(parse_peer_addr(":9341"), None);
        assert_eq!(parse_peer_addr("host:notaport"), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mine_transfer_appends_and_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let node = Node::init(test_config(&dir)).unwrap();

        let hash = node.mine_transfer("bob", 10.0).await.unwrap();
        assert_eq!(node.ledger.read().await.blocks.len(), 1);
        assert_eq!(node.ledger.read().await.tip_hash(), hash);
        assert_eq!(node.own_balance().await, STARTING_BALANCE - 10.0);
        assert_eq!(node.balance_of("bob").await, STARTING_BALANCE + 10.0);

        let saved = node.persistence.load_chain().unwrap().unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_overdraft_leaves_node_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let node = Node::init(test_config(&dir)).unwrap();

        let result = node.mine_transfer("bob", STARTING_BALANCE + 1.0).await;
        assert!(result.is_err());
        assert!(node.ledger.read().await.blocks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restart_reloads_persisted_chain() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let db_path = config.storage.path.clone();

        {
            let node = Node::init(config).unwrap();
            node.mine_transfer("bob", 5.0).await.unwrap();
            node.mine_transfer("carol", 5.0).await.unwrap();
        }

        let config = Config {
            network: NetworkConfig {
                p2p_port: 0,
                bootstrap_peers: Vec::new(),
            },
            storage: StorageConfig { path: db_path },
            chain: ChainConfig { difficulty: 1 },
        };
        let reloaded = Node::init(config).unwrap();
        assert_eq!(reloaded.ledger.read().await.blocks.len(), 2);
    }
}
