// Blockchain state machine

mod error;
mod utxo;

pub use error::ChainError;
pub use utxo::{Utxo, UtxoSet};

use crate::consensus::pow::{self, MINING_REWARD};
use crate::core::{
    Amount, Block, Transaction, TxInput, TxOutput, GENESIS_PREV_HASH, GENESIS_TIMESTAMP,
    GENESIS_TX_ID,
};
use crate::storage::ChainStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Replicated append-only ledger with its pending pool and UTXO state
///
/// The chain vector, pending pool and UTXO set are owned exclusively here;
/// every mutation goes through `submit_block` or `replace_chain`, both of
/// which restore the previous state on any validation failure.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blockchain {
    pub chain: Vec<Block>,
    #[serde(default)]
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub utxo_set: UtxoSet,
    #[serde(skip)]
    store: Option<Box<dyn ChainStore>>,
}

impl Blockchain {
    /// Create a blockchain, loading persisted state when the store has any,
    /// otherwise starting from a freshly mined genesis block
    pub fn new(store: Option<Box<dyn ChainStore>>) -> Self {
        let mut blockchain = Self {
            chain: Vec::new(),
            pending_transactions: Vec::new(),
            utxo_set: UtxoSet::new(),
            store,
        };

        if blockchain.load_from_store() {
            log::info!(
                "Loaded existing blockchain with {} blocks",
                blockchain.chain.len()
            );
        } else {
            log::info!("Creating new blockchain with genesis block");
            let genesis = genesis_block();
            // The genesis allocation stays out of the UTXO set
            blockchain.chain.push(genesis);
            blockchain.persist_all();
        }

        blockchain
    }

    /// In-memory blockchain without persistence
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Last accepted block
    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Sum of all UTXO values owned by an address
    pub fn balance(&self, address: &str) -> Amount {
        self.utxo_set.balance(address)
    }

    /// Build an unsigned transfer from the sender's UTXOs.
    ///
    /// UTXOs are selected greedily in storage order until they cover
    /// amount + fee; any excess comes back as a change output. The fee is
    /// implicit: input sum minus output sum.
    pub fn create_transaction(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
        fee: Amount,
    ) -> Result<Transaction, ChainError> {
        let required = amount
            .checked_add(fee)
            .ok_or(ChainError::InsufficientFunds {
                available: self.balance(from),
                required: Amount(u64::MAX),
            })?;

        let mut inputs = Vec::new();
        let mut total = Amount::zero();

        for utxo in self.utxo_set.find(from) {
            if total >= required {
                break;
            }
            inputs.push(TxInput::new(utxo.tx_id.clone(), utxo.out_index));
            total = total + utxo.output.value;
        }

        if total < required {
            return Err(ChainError::InsufficientFunds {
                available: total,
                required,
            });
        }

        let mut outputs = vec![TxOutput::to_address(amount, to)];
        if total > required {
            outputs.push(TxOutput::to_address(total - required, from));
        }

        let tx = Transaction::new(inputs, outputs);
        log::info!(
            "New transaction: {} -> {}: {} + {} fee ({})",
            from,
            to,
            amount,
            fee,
            &tx.id[..8]
        );
        Ok(tx)
    }

    /// Add a transaction to the pending pool unless its id is already there.
    /// Returns false on a duplicate.
    pub fn add_pending(&mut self, tx: Transaction) -> bool {
        if self.pending_transactions.iter().any(|t| t.id == tx.id) {
            return false;
        }
        self.pending_transactions.push(tx);
        true
    }

    /// Look up a transaction anywhere in the accepted chain, newest first
    pub fn find_transaction(&self, id: &str) -> Option<&Transaction> {
        self.chain
            .iter()
            .rev()
            .flat_map(|block| block.transactions.iter())
            .find(|tx| tx.id == id)
    }

    /// Collect the transactions referenced by a transaction's inputs,
    /// keyed by id. None when any referenced transaction is unknown.
    pub fn prev_transactions(&self, tx: &Transaction) -> Option<HashMap<String, Transaction>> {
        let mut map = HashMap::new();
        for input in &tx.inputs {
            if input.is_coinbase() {
                continue;
            }
            let prev = self.find_transaction(&input.tx_id)?;
            map.insert(prev.id.clone(), prev.clone());
        }
        Some(map)
    }

    /// Validate and append a candidate block, mutating the UTXO set
    /// atomically. On any failure the UTXO set, chain and pending pool are
    /// exactly as before the call.
    pub fn submit_block(&mut self, block: Block) -> Result<(), ChainError> {
        self.check_structure(&block)?;

        let snapshot = self.utxo_set.clone();

        if let Err(e) = self.validate_transactions(&block) {
            log::warn!("Transaction validation failed: {}", e);
            self.utxo_set = snapshot;
            return Err(e);
        }

        self.apply_utxo_changes(&block);

        log::info!("Block #{} accepted: {}", block.index, &block.hash[..8]);
        self.chain.push(block);
        self.pending_transactions.clear();
        self.persist_commit();

        Ok(())
    }

    /// Structural checks: proof-of-work, position, linkage
    fn check_structure(&self, block: &Block) -> Result<(), ChainError> {
        if !pow::is_valid_proof(block) {
            return Err(ChainError::InvalidProofOfWork);
        }

        let expected = self.chain.len() as u64;
        if block.index != expected {
            return Err(ChainError::IndexMismatch {
                expected,
                got: block.index,
            });
        }

        if let Some(last) = self.last_block() {
            if block.previous_hash != last.hash {
                return Err(ChainError::PreviousHashMismatch);
            }
        }

        Ok(())
    }

    /// Validate a block's transactions against the current UTXO set
    fn validate_transactions(&self, block: &Block) -> Result<(), ChainError> {
        if block.index == 0 {
            if block.transactions.len() != 1 {
                return Err(ChainError::InvalidGenesis(
                    "genesis block must have exactly one transaction".to_string(),
                ));
            }
            let genesis_tx = &block.transactions[0];
            if !genesis_tx.is_coinbase() || genesis_tx.id != GENESIS_TX_ID {
                return Err(ChainError::InvalidGenesis(
                    "genesis transaction must be the sentinel coinbase".to_string(),
                ));
            }
            return Ok(());
        }

        if block.transactions.is_empty() {
            return Err(ChainError::EmptyBlock);
        }

        let mut spent: HashSet<(String, i64)> = HashSet::new();

        for (i, tx) in block.transactions.iter().enumerate() {
            if tx.is_coinbase() {
                if i != 0 {
                    return Err(ChainError::CoinbaseNotFirst);
                }

                let total_fees: Amount = block.transactions[1..]
                    .iter()
                    .map(|t| self.utxo_set.transaction_fee(t))
                    .sum();
                let expected = MINING_REWARD + total_fees;

                if tx.outputs.len() != 1 || tx.outputs[0].value != expected {
                    return Err(ChainError::InvalidCoinbaseReward {
                        expected,
                        got: tx.total_output(),
                    });
                }
                continue;
            }

            if i == 0 {
                return Err(ChainError::CoinbaseMissing);
            }

            let mut input_sum = Amount::zero();
            for input in &tx.inputs {
                let (_, utxo) = self.utxo_set.resolve(&input.tx_id, input.out_index).ok_or(
                    ChainError::UtxoNotFound {
                        tx_id: input.tx_id.clone(),
                        out_index: input.out_index,
                    },
                )?;

                if !spent.insert((input.tx_id.clone(), input.out_index)) {
                    return Err(ChainError::DoubleSpend {
                        tx_id: input.tx_id.clone(),
                        out_index: input.out_index,
                    });
                }

                input_sum = input_sum + utxo.output.value;
            }

            let output_sum = tx.total_output();
            if input_sum < output_sum {
                return Err(ChainError::InsufficientInputs {
                    tx_id: tx.id.clone(),
                    inputs: input_sum,
                    outputs: output_sum,
                });
            }

            // Signed inputs must verify against the outputs they spend
            if tx
                .inputs
                .iter()
                .any(|input| input.signature.is_some() || input.pub_key.is_some())
            {
                let prev_txs =
                    self.prev_transactions(tx)
                        .ok_or_else(|| ChainError::InvalidSignature {
                            tx_id: tx.id.clone(),
                        })?;
                if !tx.verify_signatures(&prev_txs).unwrap_or(false) {
                    return Err(ChainError::InvalidSignature {
                        tx_id: tx.id.clone(),
                    });
                }
            }

            log::debug!(
                "Transaction {} validated: {} in, {} out",
                &tx.id[..8],
                input_sum,
                output_sum
            );
        }

        Ok(())
    }

    /// Apply a validated block: destroy spent UTXOs, create produced ones.
    /// Genesis coinbase outputs are never materialized.
    fn apply_utxo_changes(&mut self, block: &Block) {
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let owner = self
                        .utxo_set
                        .resolve(&input.tx_id, input.out_index)
                        .map(|(owner, _)| owner.to_string());
                    if let Some(owner) = owner {
                        self.utxo_set.remove(&owner, &input.tx_id, input.out_index);
                    }
                }
            }

            if tx.is_genesis() {
                continue;
            }

            for (index, output) in tx.outputs.iter().enumerate() {
                self.utxo_set.add(Utxo {
                    tx_id: tx.id.clone(),
                    out_index: index as i64,
                    output: output.clone(),
                });
            }
        }
    }

    /// True when this chain is strictly longer than the other
    pub fn is_longer_than(&self, other: &Blockchain) -> bool {
        self.chain.len() > other.chain.len()
    }

    /// Check chain well-formedness: genesis shape, proof-of-work, linkage
    /// and monotonically increasing indices
    pub fn is_valid_chain(&self) -> bool {
        match self.chain.first() {
            Some(genesis) => {
                if !genesis.is_genesis() || !pow::is_valid_proof(genesis) {
                    return false;
                }
            }
            None => return false,
        }

        for window in self.chain.windows(2) {
            let (previous, current) = (&window[0], &window[1]);

            if !pow::is_valid_proof(current)
                || current.previous_hash != previous.hash
                || current.index != previous.index + 1
            {
                return false;
            }
        }

        true
    }

    /// Replace the local chain with a strictly longer, well-formed peer
    /// chain, rebuilding the UTXO set by replaying every block from genesis.
    /// On any failure the original chain and UTXO set are restored.
    pub fn replace_chain(&mut self, peer: &Blockchain) -> Result<(), ChainError> {
        if !peer.is_valid_chain() {
            return Err(ChainError::ChainInvalid);
        }
        if !peer.is_longer_than(self) {
            return Err(ChainError::ChainNotLonger);
        }

        let chain_backup = std::mem::take(&mut self.chain);
        let utxo_backup = std::mem::take(&mut self.utxo_set);

        self.chain = peer.chain.clone();
        self.utxo_set = UtxoSet::new();

        for i in 0..self.chain.len() {
            let block = self.chain[i].clone();

            if let Err(e) = self.validate_transactions(&block) {
                log::warn!("Chain replay failed at block #{}: {}", block.index, e);
                self.chain = chain_backup;
                self.utxo_set = utxo_backup;
                return Err(e);
            }

            self.apply_utxo_changes(&block);
        }

        // Discarded pending transactions are lost; clients resubmit
        self.pending_transactions.clear();

        log::info!("Blockchain replaced with longer chain ({} blocks)", self.chain.len());
        self.persist_all();

        Ok(())
    }

    // Persistence hooks. Failures are logged; in-memory state stays
    // authoritative for the lifetime of the process.

    fn load_from_store(&mut self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        let height = match store.chain_height() {
            Ok(h) if h >= 0 => h,
            Ok(_) => return false,
            Err(e) => {
                log::error!("Failed to read chain height: {}", e);
                return false;
            }
        };

        for index in 0..=height as u64 {
            match store.load_block(index) {
                Ok(block) => self.chain.push(block),
                Err(e) => {
                    log::error!("Failed to load block {}: {}", index, e);
                    self.chain.clear();
                    return false;
                }
            }
        }

        match store.load_utxo_set() {
            Ok(utxo_set) => self.utxo_set = utxo_set,
            Err(e) => {
                log::warn!("Failed to load UTXO set, rebuilding: {}", e);
                self.rebuild_utxo_set();
            }
        }

        true
    }

    /// Rebuild the UTXO set by replaying every accepted block
    fn rebuild_utxo_set(&mut self) {
        log::info!("Rebuilding UTXO set from blockchain");
        self.utxo_set = UtxoSet::new();

        let blocks = self.chain.clone();
        for block in &blocks {
            self.apply_utxo_changes(block);
        }
    }

    fn persist_commit(&self) {
        let Some(store) = &self.store else {
            return;
        };

        if let Some(block) = self.last_block() {
            if let Err(e) = store.save_block(block) {
                log::error!("Failed to save block {}: {}", block.index, e);
            }
        }
        if let Err(e) = store.save_utxo_set(&self.utxo_set) {
            log::error!("Failed to save UTXO set: {}", e);
        }
        if let Err(e) = store.save_chain_height(self.chain.len() as i64 - 1) {
            log::error!("Failed to save chain height: {}", e);
        }
    }

    fn persist_all(&self) {
        let Some(store) = &self.store else {
            return;
        };

        for block in &self.chain {
            if let Err(e) = store.save_block(block) {
                log::error!("Failed to save block {}: {}", block.index, e);
            }
        }
        if let Err(e) = store.save_utxo_set(&self.utxo_set) {
            log::error!("Failed to save UTXO set: {}", e);
        }
        if let Err(e) = store.save_chain_height(self.chain.len() as i64 - 1) {
            log::error!("Failed to save chain height: {}", e);
        }
    }
}

/// The genesis block is fully determined: fixed timestamp, the sentinel
/// coinbase, and the nonce found by the standard search. Every node
/// constructs the identical block.
pub fn genesis_block() -> Block {
    let mut block = Block::new(
        0,
        GENESIS_TIMESTAMP,
        vec![Transaction::new_genesis()],
        GENESIS_PREV_HASH.to_string(),
    );
    pow::seal(&mut block);
    block
}
