//! Peer synchronization for tinyledger
//!
//! Pull-based, single round trip per connection: the requester sends the
//! literal `GET_CHAIN` command and the responder answers with one JSON line
//! carrying a snapshot of its full chain. The requester adopts the candidate
//! only if it validates and is strictly longer than the local chain.

use crate::block::{Block, CHAIN_FORMAT_VERSION};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::persistence::Persistence;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Command token a requester sends to ask for the responder's chain.
pub const GET_CHAIN_COMMAND: &str = "GET_CHAIN";

/// Versioned wire form of a block sequence. The same serde model backs the
/// persistence layer, so wire compatibility is not coupled to an ad-hoc
/// storage format.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ChainEnvelope {
    pub version: u32,
    pub blocks: Vec<Block>,
}

impl ChainEnvelope {
    pub fn new(blocks: Vec<Block>) -> Self {
        ChainEnvelope {
            version: CHAIN_FORMAT_VERSION,
            blocks,
        }
    }
}

/// Result of one requester exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The candidate chain was adopted; carries the new chain length.
    Replaced { height: usize },
    /// The local chain was kept (candidate not longer, or not valid).
    KeptLocal,
}

/// One node's view of the sync protocol: responder loop plus requester calls,
/// both operating on the shared ledger.
pub struct NetworkNode {
    ledger: Arc<RwLock<Ledger>>,
    persistence: Arc<Box<dyn Persistence>>,
}

impl NetworkNode {
    pub fn new(ledger: Arc<RwLock<Ledger>>, persistence: Arc<Box<dyn Persistence>>) -> Self {
        NetworkNode {
            ledger,
            persistence,
        }
    }

    /// Bind the responder on the given port and serve forever.
    pub async fn start_server(self: Arc<Self>, port: u16) -> Result<(), ChainError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| ChainError::NetworkError(format!("Failed to bind port {}: {}", port, e)))?;
        info!("Node listening on port {}", port);
        self.serve(listener).await
    }

    /// Acceptor loop: one handler task per inbound peer connection. Handler
    /// failures are isolated to their exchange and logged.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), ChainError> {
        loop {
            let (stream, peer_addr) = listener
                .accept()
                .await
                .map_err(|e| ChainError::NetworkError(format!("Accept failed: {}", e)))?;

            let node = self.clone();
            tokio::spawn(async move {
                if let Err(e) = node.handle_peer(stream).await {
                    warn!("Peer {} exchange failed: {}", peer_addr, e);
                }
            });
        }
    }

    /// Responder role: answer a GET_CHAIN request with a snapshot copy of
    /// the local chain. Unknown commands end the exchange.
    async fn handle_peer(&self, stream: TcpStream) -> Result<(), ChainError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut request = String::new();
        reader.read_line(&mut request).await?;

        if request.trim() != GET_CHAIN_COMMAND {
            return Err(ChainError::NetworkError(format!(
                "Unknown command: {:?}",
                request.trim()
            )));
        }

        let snapshot = self.ledger.read().await.blocks.clone();
        let mut response = serde_json::to_string(&ChainEnvelope::new(snapshot))?;
        response.push('\n');
        write_half.write_all(response.as_bytes()).await?;
        Ok(())
    }

    /// Requester role: fetch a peer's chain and apply the replacement
    /// decision. Any connection or protocol error aborts this one exchange
    /// and leaves the local chain untouched; the caller just logs it.
    pub async fn connect_peer(&self, host: &str, port: u16) -> Result<SyncOutcome, ChainError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            ChainError::NetworkError(format!("Failed to connect to {}:{}: {}", host, port, e))
        })?;

        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(format!("{}\n", GET_CHAIN_COMMAND).as_bytes())
            .await?;

        let mut reader = BufReader::new(read_half);
        let mut response = String::new();
        reader.read_line(&mut response).await?;
        if response.is_empty() {
            return Err(ChainError::NetworkError(
                "Peer closed connection without a response".to_string(),
            ));
        }

        let envelope: ChainEnvelope = serde_json::from_str(response.trim())?;
        if envelope.version != CHAIN_FORMAT_VERSION {
            return Err(ChainError::NetworkError(format!(
                "Unsupported wire version {} (expected {})",
                envelope.version, CHAIN_FORMAT_VERSION
            )));
        }

        self.apply_candidate(envelope.blocks).await
    }

    /// Replacement decision, atomic with respect to concurrent admission and
    /// other replacements: validation, length comparison and the swap all
    /// happen under one write lock.
    async fn apply_candidate(&self, candidate: Vec<Block>) -> Result<SyncOutcome, ChainError> {
        let mut ledger = self.ledger.write().await;
        if ledger.replace_if_longer(candidate) {
            let height = ledger.blocks.len();
            info!("Synced to longer valid chain ({} blocks)", height);
            if let Err(e) = self.persistence.save_chain(&ledger.blocks) {
                // In-memory chain stays authoritative; the miss is operator-visible.
                warn!("Failed to persist synced chain: {}", e);
            }
            Ok(SyncOutcome::Replaced { height })
        } else {
            Ok(SyncOutcome::KeptLocal)
        }
    }
}
