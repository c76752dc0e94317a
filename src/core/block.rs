// Block data structures

use crate::core::{sha256_hex, Transaction};
use serde::{Deserialize, Serialize};

/// Previous-hash value of the genesis block (64 zeros)
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Fixed genesis timestamp (2024-01-01T00:00:00Z), identical on every node
pub const GENESIS_TIMESTAMP: u64 = 1_704_067_200;

/// Block - an ordered batch of transactions linked to its predecessor by hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

/// Hash preimage: every block field except the hash itself
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Preimage<'a> {
    index: u64,
    timestamp: u64,
    transactions: &'a [Transaction],
    previous_hash: &'a str,
    nonce: u64,
}

impl Block {
    /// Create an unsealed block candidate (hash empty, nonce zero)
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        }
    }

    /// Canonical block hash: hex SHA256 of the deterministic serialization
    /// of all fields except the hash field itself
    pub fn compute_hash(&self) -> String {
        let preimage = Preimage {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
        };

        let bytes = serde_json::to_vec(&preimage).expect("block preimage serialization cannot fail");
        sha256_hex(&bytes)
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREV_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Amount;

    fn sample_block() -> Block {
        let tx = Transaction::new_coinbase("miner", Amount::from_whole(10));
        Block::new(1, 1_700_000_000, vec![tx], "ab".repeat(32))
    }

    #[test]
    fn test_hash_deterministic() {
        let block = sample_block();
        assert_eq!(block.compute_hash(), block.compute_hash());
        assert_eq!(block.compute_hash().len(), 64);
    }

    #[test]
    fn test_hash_excludes_hash_field() {
        let mut block = sample_block();
        let before = block.compute_hash();

        block.hash = "ff".repeat(32);
        assert_eq!(block.compute_hash(), before);
    }

    #[test]
    fn test_hash_covers_nonce() {
        let mut block = sample_block();
        let before = block.compute_hash();

        block.nonce += 1;
        assert_ne!(block.compute_hash(), before);
    }

    #[test]
    fn test_hash_covers_transactions() {
        let mut block = sample_block();
        let before = block.compute_hash();

        block
            .transactions
            .push(Transaction::new_coinbase("other", Amount::from_whole(1)));
        assert_ne!(block.compute_hash(), before);
    }

    #[test]
    fn test_is_genesis() {
        let mut block = sample_block();
        assert!(!block.is_genesis());

        block.index = 0;
        block.previous_hash = GENESIS_PREV_HASH.to_string();
        assert!(block.is_genesis());
    }

    #[test]
    fn test_wire_round_trip() {
        let mut block = sample_block();
        block.hash = block.compute_hash();

        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, decoded);

        assert!(json.contains("\"previousHash\""));
    }
}
