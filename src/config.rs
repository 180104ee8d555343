//! Configuration management for tinyledger

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,
    /// Peers dialed once at startup, `host:port` each.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ChainConfig {
    /// Leading zero hex digits required of every block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            p2p_port: default_p2p_port(),
            bootstrap_peers: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: default_db_path(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: default_difficulty(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            chain: ChainConfig::default(),
        }
    }
}

/// Load `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from("config.toml")
}

pub fn load_config_from(path: &str) -> Result<Config, ChainError> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::ConfigError(format!("Failed to parse {}: {}", path, e)))?
    };

    // Validate critical values
    if config.storage.path.is_empty() {
        return Err(ChainError::ConfigError(
            "storage.path must be set".to_string(),
        ));
    }
    // A SHA-256 hex digest has 64 characters; more zeros than that is unmineable.
    if config.chain.difficulty > 64 {
        return Err(ChainError::ConfigError(
            "chain.difficulty must be at most 64".to_string(),
        ));
    }

    Ok(config)
}

fn default_p2p_port() -> u16 {
    9341
}

fn default_db_path() -> String {
    "./data/chain.db".to_string()
}

fn default_difficulty() -> usize {
    4
}
