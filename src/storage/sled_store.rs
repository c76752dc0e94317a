// Chain persistence backed by sled

use crate::chain::{Utxo, UtxoSet};
use crate::core::Block;
use crate::storage::ChainStore;
use sled::Db;
use std::collections::HashMap;
use std::path::Path;

const BLOCK_PREFIX: &str = "block:";
const UTXO_PREFIX: &str = "utxo:";
const META_CHAIN_HEIGHT: &str = "meta:chain_height";

/// Key-value chain store with one entry per block, one UTXO list per
/// address, and a chain-height marker
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open (or create) a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let db = sled::open(path).map_err(|e| format!("Failed to open database: {}", e))?;
        Ok(Self { db })
    }

    /// Create an in-memory store (for testing)
    pub fn memory() -> Result<Self, String> {
        let config = sled::Config::new().temporary(true);
        let db = config
            .open()
            .map_err(|e| format!("Failed to create memory db: {}", e))?;
        Ok(Self { db })
    }

    fn block_key(index: u64) -> String {
        format!("{}{}", BLOCK_PREFIX, index)
    }

    fn utxo_key(address: &str) -> String {
        format!("{}{}", UTXO_PREFIX, address)
    }
}

impl ChainStore for SledStore {
    fn save_block(&self, block: &Block) -> Result<(), String> {
        let data =
            serde_json::to_vec(block).map_err(|e| format!("Failed to serialize block: {}", e))?;

        self.db
            .insert(Self::block_key(block.index).as_bytes(), data)
            .map_err(|e| format!("Failed to store block: {}", e))?;
        self.db
            .flush()
            .map_err(|e| format!("Failed to flush: {}", e))?;

        Ok(())
    }

    fn load_block(&self, index: u64) -> Result<Block, String> {
        let data = self
            .db
            .get(Self::block_key(index).as_bytes())
            .map_err(|e| format!("Database error: {}", e))?
            .ok_or_else(|| format!("Block {} not found", index))?;

        serde_json::from_slice(&data).map_err(|e| format!("Failed to decode block: {}", e))
    }

    fn save_utxo_set(&self, utxo_set: &UtxoSet) -> Result<(), String> {
        // Full replacement: drop every stale address entry first
        let stale: Vec<_> = self
            .db
            .scan_prefix(UTXO_PREFIX.as_bytes())
            .keys()
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Database error: {}", e))?;
        for key in stale {
            self.db
                .remove(key)
                .map_err(|e| format!("Failed to clear UTXO entry: {}", e))?;
        }

        for (address, utxos) in utxo_set.entries() {
            let data = serde_json::to_vec(utxos)
                .map_err(|e| format!("Failed to serialize UTXOs for {}: {}", address, e))?;
            self.db
                .insert(Self::utxo_key(address).as_bytes(), data)
                .map_err(|e| format!("Failed to store UTXOs: {}", e))?;
        }

        self.db
            .flush()
            .map_err(|e| format!("Failed to flush: {}", e))?;

        Ok(())
    }

    fn load_utxo_set(&self) -> Result<UtxoSet, String> {
        let mut entries: HashMap<String, Vec<Utxo>> = HashMap::new();

        for item in self.db.scan_prefix(UTXO_PREFIX.as_bytes()) {
            let (key, value) = item.map_err(|e| format!("Iterator error: {}", e))?;

            let key = String::from_utf8(key.to_vec())
                .map_err(|e| format!("Invalid UTXO key: {}", e))?;
            let address = key[UTXO_PREFIX.len()..].to_string();

            let utxos: Vec<Utxo> = serde_json::from_slice(&value)
                .map_err(|e| format!("Failed to decode UTXOs for {}: {}", address, e))?;
            entries.insert(address, utxos);
        }

        Ok(UtxoSet::from(entries))
    }

    fn save_chain_height(&self, height: i64) -> Result<(), String> {
        let data = serde_json::to_vec(&height)
            .map_err(|e| format!("Failed to serialize height: {}", e))?;

        self.db
            .insert(META_CHAIN_HEIGHT.as_bytes(), data)
            .map_err(|e| format!("Failed to store height: {}", e))?;
        self.db
            .flush()
            .map_err(|e| format!("Failed to flush: {}", e))?;

        Ok(())
    }

    fn chain_height(&self) -> Result<i64, String> {
        match self
            .db
            .get(META_CHAIN_HEIGHT.as_bytes())
            .map_err(|e| format!("Database error: {}", e))?
        {
            Some(data) => {
                serde_json::from_slice(&data).map_err(|e| format!("Invalid height data: {}", e))
            }
            None => Ok(-1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, Transaction, TxOutput};

    fn sample_block(index: u64) -> Block {
        let tx = Transaction::new_coinbase("miner", Amount::from_whole(10));
        let mut block = Block::new(index, 1_700_000_000, vec![tx], "ab".repeat(32));
        block.hash = block.compute_hash();
        block
    }

    #[test]
    fn test_store_and_load_block() {
        let store = SledStore::memory().unwrap();
        let block = sample_block(3);

        store.save_block(&block).unwrap();
        let loaded = store.load_block(3).unwrap();

        assert_eq!(block, loaded);
        assert!(store.load_block(4).is_err());
    }

    #[test]
    fn test_chain_height_sentinel() {
        let store = SledStore::memory().unwrap();

        // No chain persisted yet
        assert_eq!(store.chain_height().unwrap(), -1);

        store.save_chain_height(7).unwrap();
        assert_eq!(store.chain_height().unwrap(), 7);
    }

    #[test]
    fn test_utxo_set_round_trip() {
        let store = SledStore::memory().unwrap();

        let mut utxo_set = UtxoSet::new();
        utxo_set.add(Utxo {
            tx_id: "t1".to_string(),
            out_index: 0,
            output: TxOutput {
                value: Amount(500),
                address: "alice".to_string(),
                script_pub: String::new(),
            },
        });
        utxo_set.add(Utxo {
            tx_id: "t2".to_string(),
            out_index: 1,
            output: TxOutput {
                value: Amount(900),
                address: "bob".to_string(),
                script_pub: String::new(),
            },
        });

        store.save_utxo_set(&utxo_set).unwrap();
        let loaded = store.load_utxo_set().unwrap();

        assert_eq!(loaded, utxo_set);
    }

    #[test]
    fn test_utxo_save_is_full_replacement() {
        let store = SledStore::memory().unwrap();

        let mut first = UtxoSet::new();
        first.add(Utxo {
            tx_id: "t1".to_string(),
            out_index: 0,
            output: TxOutput {
                value: Amount(500),
                address: "alice".to_string(),
                script_pub: String::new(),
            },
        });
        store.save_utxo_set(&first).unwrap();

        // Alice's entry must not survive a save without her
        let mut second = UtxoSet::new();
        second.add(Utxo {
            tx_id: "t2".to_string(),
            out_index: 0,
            output: TxOutput {
                value: Amount(100),
                address: "bob".to_string(),
                script_pub: String::new(),
            },
        });
        store.save_utxo_set(&second).unwrap();

        let loaded = store.load_utxo_set().unwrap();
        assert_eq!(loaded, second);
        assert!(loaded.find("alice").is_empty());
    }

    #[test]
    fn test_blockchain_reload() {
        use crate::chain::Blockchain;
        use crate::consensus::Miner;

        let config = sled::Config::new().temporary(true);
        let db = config.open().unwrap();

        let store = SledStore { db: db.clone() };
        let mut blockchain = Blockchain::new(Some(Box::new(store)));

        let block = Miner::new("miner".to_string()).mine(&blockchain);
        blockchain.submit_block(block).unwrap();

        // A fresh chain over the same database resumes where it left off
        let reopened = Blockchain::new(Some(Box::new(SledStore { db })));
        assert_eq!(reopened.chain.len(), 2);
        assert_eq!(
            reopened.last_block().unwrap().hash,
            blockchain.last_block().unwrap().hash
        );
        assert_eq!(reopened.balance("miner"), Amount::from_whole(10));
    }
}
