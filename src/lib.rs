// Educational proof-of-work cryptocurrency node

pub mod chain;
pub mod cli;
pub mod consensus;
pub mod core;
pub mod merkle;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use chain::{Blockchain, ChainError, Utxo, UtxoSet};
pub use consensus::{Miner, DIFFICULTY, MINING_REWARD};
pub use core::{Amount, Block, Transaction, TxInput, TxOutput};
pub use merkle::{verify_proof, MerkleProof, MerkleTree};
pub use network::Node;
pub use storage::{ChainStore, SledStore};
pub use wallet::{Wallet, Wallets};
