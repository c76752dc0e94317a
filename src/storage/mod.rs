// Persistence layer

mod sled_store;

pub use sled_store::SledStore;

use crate::chain::UtxoSet;
use crate::core::Block;

/// Persistence contract for the blockchain.
///
/// The UTXO set is saved with full-replacement semantics; there is no delta
/// format. A height of -1 means no chain has been persisted yet. Adapters
/// must be safe to call from concurrent contexts; the chain serializes
/// writes through the node lock, so calls arrive in chain order.
pub trait ChainStore: Send + Sync {
    fn save_block(&self, block: &Block) -> Result<(), String>;
    fn load_block(&self, index: u64) -> Result<Block, String>;
    fn save_utxo_set(&self, utxo_set: &UtxoSet) -> Result<(), String>;
    fn load_utxo_set(&self) -> Result<UtxoSet, String>;
    fn save_chain_height(&self, height: i64) -> Result<(), String>;
    fn chain_height(&self) -> Result<i64, String>;
}
