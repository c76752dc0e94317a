// UTXO set management

use crate::core::{Amount, Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unspent transaction output with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub out_index: i64,
    pub output: TxOutput,
}

/// UTXO set indexed by owner address
///
/// Each (tx_id, out_index) pair appears at most once across the whole set.
/// Snapshots for rollback are plain clones; everything is owned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtxoSet {
    entries: HashMap<String, Vec<Utxo>>,
}

impl UtxoSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// UTXOs owned by an address, in storage order
    pub fn find(&self, address: &str) -> &[Utxo] {
        self.entries.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert a UTXO under its output's address
    pub fn add(&mut self, utxo: Utxo) {
        log::debug!(
            "Added UTXO: {}[{}] to {} ({})",
            short_id(&utxo.tx_id),
            utxo.out_index,
            utxo.output.address,
            utxo.output.value
        );
        self.entries
            .entry(utxo.output.address.clone())
            .or_default()
            .push(utxo);
    }

    /// Remove a spent UTXO from its owner's list
    pub fn remove(&mut self, address: &str, tx_id: &str, out_index: i64) {
        if let Some(utxos) = self.entries.get_mut(address) {
            if let Some(pos) = utxos
                .iter()
                .position(|u| u.tx_id == tx_id && u.out_index == out_index)
            {
                utxos.remove(pos);
                log::debug!("Removed UTXO: {}[{}] from {}", short_id(tx_id), out_index, address);
            }
            if self.entries.get(address).is_some_and(Vec::is_empty) {
                self.entries.remove(address);
            }
        }
    }

    /// Locate a UTXO by reference, returning its owner address
    pub fn resolve(&self, tx_id: &str, out_index: i64) -> Option<(&str, &Utxo)> {
        for (address, utxos) in &self.entries {
            for utxo in utxos {
                if utxo.tx_id == tx_id && utxo.out_index == out_index {
                    return Some((address.as_str(), utxo));
                }
            }
        }
        None
    }

    /// Check whether a referenced output is still unspent
    pub fn contains(&self, tx_id: &str, out_index: i64) -> bool {
        self.resolve(tx_id, out_index).is_some()
    }

    /// Sum of all UTXO values owned by an address
    pub fn balance(&self, address: &str) -> Amount {
        self.find(address).iter().map(|u| u.output.value).sum()
    }

    /// Sum of all UTXO values in the set (the circulating supply)
    pub fn total_supply(&self) -> Amount {
        self.entries
            .values()
            .flat_map(|utxos| utxos.iter().map(|u| u.output.value))
            .sum()
    }

    /// Fee of a transaction against this set:
    /// sum of resolved input values minus sum of output values
    pub fn transaction_fee(&self, tx: &Transaction) -> Amount {
        if tx.is_coinbase() {
            return Amount::zero();
        }

        let input_sum: Amount = tx
            .inputs
            .iter()
            .filter_map(|input| self.resolve(&input.tx_id, input.out_index))
            .map(|(_, utxo)| utxo.output.value)
            .sum();

        input_sum.saturating_sub(tx.total_output())
    }

    /// Per-address entries, for persistence
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Vec<Utxo>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, Vec<Utxo>>> for UtxoSet {
    fn from(entries: HashMap<String, Vec<Utxo>>) -> Self {
        Self { entries }
    }
}

fn short_id(tx_id: &str) -> &str {
    if tx_id.len() > 8 {
        &tx_id[..8]
    } else {
        tx_id
    }
}
