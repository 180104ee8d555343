//! Integration tests for wallet signing, block admission and balance accounting

use tinyledger::block::Block;
use tinyledger::error::ChainError;
use tinyledger::ledger::{Ledger, STARTING_BALANCE};
use tinyledger::wallet::Wallet;

const DIFFICULTY: usize = 1;

#[test]
fn test_transfer_chain_between_wallets() -> Result<(), Box<dyn std::error::Error>> {
    let alice = Wallet::new()?;
    let bob = Wallet::new()?;
    let mut ledger = Ledger::new(DIFFICULTY);

    // Alice pays Bob 40, then Bob pays Alice back 15, one block each.
    let block = Block::new(ledger.tip_hash(), vec![alice.create_transfer(&bob.identity, 40.0)?]);
    ledger.add_block(block)?;

    let block = Block::new(ledger.tip_hash(), vec![bob.create_transfer(&alice.identity, 15.0)?]);
    ledger.add_block(block)?;

    assert_eq!(ledger.balance_of(&alice.identity), STARTING_BALANCE - 40.0 + 15.0);
    assert_eq!(ledger.balance_of(&bob.identity), STARTING_BALANCE + 40.0 - 15.0);

    // Total supply is conserved beyond the implicit per-address stake.
    let total = ledger.balance_of(&alice.identity) + ledger.balance_of(&bob.identity);
    assert_eq!(total, 2.0 * STARTING_BALANCE);

    assert!(Ledger::is_chain_valid(&ledger.blocks, DIFFICULTY));
    Ok(())
}

#[test]
fn test_overdraft_after_spending_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let alice = Wallet::new()?;
    let bob = Wallet::new()?;
    let mut ledger = Ledger::new(DIFFICULTY);

    let block = Block::new(ledger.tip_hash(), vec![alice.create_transfer(&bob.identity, 90.0)?]);
    ledger.add_block(block)?;

    // Alice only has 10 left; a 20-unit transfer must be rejected whole.
    let block = Block::new(ledger.tip_hash(), vec![alice.create_transfer(&bob.identity, 20.0)?]);
    let result = ledger.add_block(block);
    assert!(matches!(result, Err(ChainError::InsufficientFunds(_))));
    assert_eq!(ledger.blocks.len(), 1);

    Ok(())
}

#[test]
fn test_every_mined_block_meets_difficulty() -> Result<(), Box<dyn std::error::Error>> {
    let alice = Wallet::new()?;
    let mut ledger = Ledger::new(2);

    let block = Block::new(ledger.tip_hash(), vec![alice.create_transfer("bob", 1.0)?]);
    ledger.add_block(block)?;

    for block in &ledger.blocks {
        assert!(Block::meets_target(&block.hash, 2));
        assert_eq!(block.hash, block.compute_hash());
    }
    Ok(())
}
