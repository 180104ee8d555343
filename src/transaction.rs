//! Transaction types for tinyledger

use crate::crypto::{self, KeyPair};
use crate::error::ChainError;

/// Sentinel sender that bypasses signature verification. Reserved for a
/// future minting transaction type; no issuance policy is implied.
pub const NETWORK_SENDER: &str = "Network";

/// A signed value transfer. Immutable once signed and embedded in a block.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    /// Signer identity (base64 public key), or [`NETWORK_SENDER`].
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    /// Compact ECDSA signature over [`Transaction::signable_payload`].
    /// Empty until signed; stays empty for network-sentinel transactions.
    #[serde(default)]
    pub signature: Vec<u8>,
}

impl Transaction {
    pub fn new(sender: String, recipient: String, amount: f64) -> Self {
        Transaction {
            sender,
            recipient,
            amount,
            signature: Vec::new(),
        }
    }

    /// The fixed textual form the signature is computed over.
    pub fn signable_payload(&self) -> String {
        format!("{}{}{}", self.sender, self.recipient, self.amount)
    }

    /// Deterministic record fed into the block hash. Covers the signature as
    /// well, so any field change perturbs the containing block's hash.
    pub fn canonical_record(&self) -> String {
        format!(
            "{}>{}:{}:{}",
            self.sender,
            self.recipient,
            self.amount,
            hex::encode(&self.signature)
        )
    }

    /// Sign this transaction with the given keypair.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        let signature = keypair.sign(self.signable_payload().as_bytes())?;
        self.signature = signature.to_vec();
        Ok(())
    }

    /// Check authenticity. The network sentinel always verifies; everything
    /// else requires a signature that checks out under the public key decoded
    /// from `sender`. Fails closed on malformed keys or signatures.
    pub fn verify(&self) -> bool {
        if self.sender == NETWORK_SENDER {
            return true;
        }
        if self.signature.is_empty() {
            return false;
        }
        let public_key = match crypto::public_key_from_identity(&self.sender) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        crypto::verify_signature(
            &public_key,
            self.signable_payload().as_bytes(),
            &self.signature,
        )
        .is_ok()
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let short_sender: String = self.sender.chars().take(10).collect();
        write!(
            f,
            "{}... sent {} to {}",
            short_sender, self.amount, self.recipient
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_transfer(keypair: &KeyPair, recipient: &str, amount: f64) -> Transaction {
        let mut tx = Transaction::new(keypair.identity(), recipient.to_string(), amount);
        tx.sign(keypair).unwrap();
        tx
    }

    #[test]
    fn test_network_sender_verifies_without_signature() {
        let tx = Transaction::new(NETWORK_SENDER.to_string(), "alice".to_string(), 10.0);
        assert!(tx.signature.is_empty());
        assert!(tx.verify());
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = KeyPair::generate().unwrap();
        let tx = signed_transfer(&keypair, "bob", 25.0);
        assert!(tx.verify());
    }

    #[test]
    fn test_unsigned_transaction_fails() {
        let keypair = KeyPair::generate().unwrap();
        let tx = Transaction::new(keypair.identity(), "bob".to_string(), 25.0);
        assert!(!tx.verify());
    }

    #[test]
    fn test_tampered_amount_fails() {
        let keypair = KeyPair::generate().unwrap();
        let mut tx = signed_transfer(&keypair, "bob", 25.0);
        tx.amount = 2500.0;
        assert!(!tx.verify());
    }

    #[test]
    fn test_tampered_recipient_fails() {
        let keypair = KeyPair::generate().unwrap();
        let mut tx = signed_transfer(&keypair, "bob", 25.0);
        tx.recipient = "mallory".to_string();
        assert!(!tx.verify());
    }

    #[test]
    fn test_malformed_sender_fails_closed() {
        let keypair = KeyPair::generate().unwrap();
        let mut tx = signed_transfer(&keypair, "bob", 25.0);
        tx.sender = "definitely not a key".to_string();
        assert!(!tx.verify());
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let keypair = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let mut tx = Transaction::new(keypair.identity(), "bob".to_string(), 5.0);
        tx.sign(&other).unwrap();
        assert!(!tx.verify());
    }

    #[test]
    fn test_canonical_record_covers_signature() {
        let keypair = KeyPair::generate().unwrap();
        let unsigned = Transaction::new(keypair.identity(), "bob".to_string(), 5.0);
        let mut signed = unsigned.clone();
        signed.sign(&keypair).unwrap();
        assert_ne!(unsigned.canonical_record(), signed.canonical_record());
    }
}
