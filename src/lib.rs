//! tinyledger - A minimal proof-of-work value ledger with pull-based peer sync
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`ledger`] - Block sequence, balance accounting, admission, validation
//! - [`transaction`] - Signed transfer records
//! - [`block`] - Block structure, hashing and proof-of-work
//!
//! ## Cryptography & Identity
//! - [`crypto`] - ECDSA signatures over secp256k1
//! - [`wallet`] - Node keypair and transaction signing
//!
//! ## Networking & State
//! - [`sync`] - GET_CHAIN exchange and longest-chain replacement
//! - [`persistence`] - Database layer (SQLite)
//!
//! ## Configuration & Utilities
//! - [`node`] - Node orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod block;
pub mod ledger;
pub mod transaction;

// ============================================================================
// Cryptography & Identity
// ============================================================================
pub mod crypto;
pub mod wallet;

// ============================================================================
// Networking & State
// ============================================================================
pub mod persistence;
pub mod sync;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod node;
