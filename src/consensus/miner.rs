// Block miner

use crate::chain::Blockchain;
use crate::consensus::pow::{self, MINING_REWARD};
use crate::core::{Amount, Block, Transaction};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Miner bound to a reward address
pub struct Miner {
    pub address: String,
}

impl Miner {
    pub fn new(address: String) -> Self {
        Self { address }
    }

    /// Assemble and seal a candidate block: a coinbase paying the reward
    /// plus the pending pool's fees, followed by the pending transactions
    pub fn mine(&self, blockchain: &Blockchain) -> Block {
        log::info!("Miner {} started mining new block", self.address);

        let total_fees: Amount = blockchain
            .pending_transactions
            .iter()
            .map(|tx| blockchain.utxo_set.transaction_fee(tx))
            .sum();

        let coinbase = Transaction::new_coinbase(&self.address, MINING_REWARD + total_fees);

        let mut transactions = vec![coinbase];
        transactions.extend(blockchain.pending_transactions.iter().cloned());

        let previous_hash = blockchain
            .last_block()
            .map(|b| b.hash.clone())
            .unwrap_or_default();

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut block = Block::new(
            blockchain.chain.len() as u64,
            timestamp,
            transactions,
            previous_hash,
        );

        let started = Instant::now();
        let attempts = pow::seal(&mut block);
        let elapsed = started.elapsed();

        log::info!(
            "Block mined: nonce {}, {} attempts in {:?} ({:.1} KH/s)",
            block.nonce,
            attempts,
            elapsed,
            attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1000.0
        );

        block
    }
}
