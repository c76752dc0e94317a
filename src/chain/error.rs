// Chain error types

use crate::core::Amount;

/// Errors surfaced by the blockchain state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Block hash doesn't satisfy the difficulty target or doesn't match
    /// the block's canonical serialization
    InvalidProofOfWork,
    /// Block index is not the next position in the chain
    IndexMismatch { expected: u64, got: u64 },
    /// Block doesn't link back to the current chain head
    PreviousHashMismatch,
    /// Genesis block content is not the expected sentinel
    InvalidGenesis(String),
    /// Non-genesis block carries no transactions
    EmptyBlock,
    /// First transaction of a block is not a coinbase
    CoinbaseMissing,
    /// A coinbase transaction appears after the first position
    CoinbaseNotFirst,
    /// Coinbase output doesn't equal reward plus collected fees
    InvalidCoinbaseReward { expected: Amount, got: Amount },
    /// Referenced output is not unspent in the current UTXO set
    UtxoNotFound { tx_id: String, out_index: i64 },
    /// Two transactions in one block spend the same output
    DoubleSpend { tx_id: String, out_index: i64 },
    /// Transaction outputs exceed its inputs
    InsufficientInputs {
        tx_id: String,
        inputs: Amount,
        outputs: Amount,
    },
    /// An input signature failed verification
    InvalidSignature { tx_id: String },
    /// Sender's UTXOs cannot cover amount plus fee
    InsufficientFunds { available: Amount, required: Amount },
    /// Peer chain is not strictly longer than the local chain
    ChainNotLonger,
    /// Peer chain is not well-formed
    ChainInvalid,
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChainError::InvalidProofOfWork => write!(f, "Invalid proof of work"),
            ChainError::IndexMismatch { expected, got } => {
                write!(f, "Block index {} is not the expected {}", got, expected)
            }
            ChainError::PreviousHashMismatch => {
                write!(f, "Block does not link to the chain head")
            }
            ChainError::InvalidGenesis(reason) => write!(f, "Invalid genesis block: {}", reason),
            ChainError::EmptyBlock => {
                write!(f, "Non-genesis blocks must have at least one transaction")
            }
            ChainError::CoinbaseMissing => {
                write!(f, "First transaction must be a coinbase")
            }
            ChainError::CoinbaseNotFirst => {
                write!(f, "Coinbase transaction must be the first in the block")
            }
            ChainError::InvalidCoinbaseReward { expected, got } => {
                write!(f, "Invalid coinbase reward: expected {}, got {}", expected, got)
            }
            ChainError::UtxoNotFound { tx_id, out_index } => {
                write!(f, "UTXO not found: {}[{}]", tx_id, out_index)
            }
            ChainError::DoubleSpend { tx_id, out_index } => {
                write!(f, "Output {}[{}] spent twice in one block", tx_id, out_index)
            }
            ChainError::InsufficientInputs {
                tx_id,
                inputs,
                outputs,
            } => write!(
                f,
                "Transaction {}: insufficient inputs ({}) for outputs ({})",
                tx_id, inputs, outputs
            ),
            ChainError::InvalidSignature { tx_id } => {
                write!(f, "Transaction {}: invalid signature", tx_id)
            }
            ChainError::InsufficientFunds {
                available,
                required,
            } => write!(
                f,
                "Insufficient funds: have {}, need {}",
                available, required
            ),
            ChainError::ChainNotLonger => write!(f, "Peer chain is not longer"),
            ChainError::ChainInvalid => write!(f, "Peer chain is invalid"),
        }
    }
}

impl std::error::Error for ChainError {}
