#![forbid(unsafe_code)]
//! tinyledger node: responder loop plus an interactive operator console.

use clap::Parser;
use std::sync::Arc;
use tinyledger::config::load_config_from;
use tinyledger::node::Node;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "tinyledger-node", about = "Run a tinyledger node")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Override the P2P listen port from the config
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = match load_config_from(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.network.p2p_port = port;
    }

    // No wallet means no node identity; nothing to do but stop.
    let node = match Node::init(config) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            error!("Failed to initialize node: {}", e);
            std::process::exit(1);
        }
    };
    node.clone().start().await;

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["mine", recipient, amount] => match amount.parse::<f64>() {
                Ok(amount) if amount >= 0.0 => match node.mine_transfer(recipient, amount).await {
                    Ok(hash) => println!("Block mined: {}", hash),
                    Err(e) => println!("{}", e),
                },
                _ => println!("Amount must be a non-negative number"),
            },
            ["connect", addr] => match addr.rsplit_once(':') {
                Some((host, port)) => match port.parse::<u16>() {
                    Ok(port) => match node.sync_with(host, port).await {
                        Ok(outcome) => println!("Sync result: {:?}", outcome),
                        Err(e) => println!("{}", e),
                    },
                    Err(_) => println!("Format: connect HOST:PORT"),
                },
                None => println!("Format: connect HOST:PORT"),
            },
            ["list"] => {
                let summaries = node.block_summaries().await;
                if summaries.is_empty() {
                    println!("Chain is empty");
                }
                for line in summaries {
                    println!("{}", line);
                }
            }
            ["balance"] => {
                println!("Address: {}", node.wallet.identity);
                println!("Current balance: {}", node.own_balance().await);
            }
            ["balance", address] => {
                println!("Balance of {}: {}", address, node.balance_of(address).await);
            }
            ["exit"] | ["quit"] => {
                match node.save().await {
                    Ok(()) => println!("Chain saved. Bye."),
                    Err(e) => println!("Save failed: {}", e),
                }
                break;
            }
            [] => {}
            _ => print_help(),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  mine <recipient> <amount>  - sign a transfer and mine it into a block");
    println!("  connect <host:port>        - pull a peer's chain and sync");
    println!("  list                       - list blocks");
    println!("  balance [address]          - query a balance (own wallet by default)");
    println!("  exit                       - save the chain and quit");
}
