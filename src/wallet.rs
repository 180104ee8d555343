//! Node wallet: keypair ownership and transaction signing.

use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::transaction::Transaction;

/// One wallet per node. The secret key never leaves this struct and is
/// never serialized; only the derived identity string is shared.
pub struct Wallet {
    keypair: KeyPair,
    /// Public identity: base64 of the compressed public key. Doubles as the
    /// balance address and the signature verification key.
    pub identity: String,
}

impl Wallet {
    pub fn new() -> Result<Self, ChainError> {
        let keypair = KeyPair::generate()?;
        let identity = keypair.identity();
        Ok(Wallet { keypair, identity })
    }

    /// Build and sign a transfer from this wallet's identity.
    pub fn create_transfer(&self, recipient: &str, amount: f64) -> Result<Transaction, ChainError> {
        let mut tx = Transaction::new(self.identity.clone(), recipient.to_string(), amount);
        tx.sign(&self.keypair)?;
        Ok(tx)
    }

    /// Sign an existing transaction. The sender must be this wallet.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<(), ChainError> {
        if tx.sender != self.identity {
            return Err(ChainError::InvalidTransaction(
                "Cannot sign a transaction for another sender".to_string(),
            ));
        }
        tx.sign(&self.keypair)
    }
}
