// Transaction data structures

use crate::core::{sha256_bytes, sha256_hex, Amount};
use crate::wallet::address;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed identifier of the genesis coinbase transaction
pub const GENESIS_TX_ID: &str = "genesis-coinbase-transaction";

/// Sentinel address owning the genesis allocation; never enters the UTXO set
pub const GENESIS_ADDRESS: &str = "unspendable";

/// Genesis allocation (unspendable by construction)
pub const GENESIS_ALLOCATION: Amount = Amount(50 * crate::core::COIN);

/// Transaction input - references a previous transaction output
///
/// A coinbase input references nothing: empty transaction id and index -1.
/// Signature and public key are hex-encoded and absent until signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub tx_id: String,
    pub out_index: i64,
    pub signature: Option<String>,
    pub pub_key: Option<String>,
}

impl TxInput {
    /// Create an input spending a referenced output (unsigned)
    pub fn new(tx_id: String, out_index: i64) -> Self {
        Self {
            tx_id,
            out_index,
            signature: None,
            pub_key: None,
        }
    }

    /// Create a coinbase input (mints new coins)
    pub fn coinbase() -> Self {
        Self {
            tx_id: String::new(),
            out_index: -1,
            signature: None,
            pub_key: None,
        }
    }

    /// Check if this is a coinbase input
    pub fn is_coinbase(&self) -> bool {
        self.tx_id.is_empty() && self.out_index == -1
    }
}

/// Transaction output - an amount locked to an address
///
/// `script_pub` is the hex SHA256 of the owner's public key, the single-key
/// spend condition. It is empty for sentinel addresses that decode to no key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub value: Amount,
    pub address: String,
    pub script_pub: String,
}

impl TxOutput {
    /// Create an output locked to an address. The spend condition is the
    /// public key hash embedded in the address itself.
    pub fn to_address(value: Amount, addr: &str) -> Self {
        let script_pub = address::pubkey_hash_of(addr)
            .map(hex::encode)
            .unwrap_or_default();

        Self {
            value,
            address: addr.to_string(),
            script_pub,
        }
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Input view used for canonical hashing: signature and public key are
/// stripped, except that signing substitutes the referenced script_pub for
/// the input currently being signed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreimageInput<'a> {
    tx_id: &'a str,
    out_index: i64,
    signature: Option<&'a str>,
    pub_key: Option<&'a str>,
}

/// Canonical preimage: the transaction without its id and signatures.
/// Field order is declaration order, so the JSON encoding is deterministic.
#[derive(Serialize)]
struct Preimage<'a> {
    inputs: Vec<PreimageInput<'a>>,
    outputs: &'a [TxOutput],
}

impl Transaction {
    /// Create a transaction from inputs and outputs; the identifier is the
    /// content hash of the signature-free canonical form
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create a coinbase transaction minting `reward` to `address`
    pub fn new_coinbase(addr: &str, reward: Amount) -> Self {
        Self::new(
            vec![TxInput::coinbase()],
            vec![TxOutput::to_address(reward, addr)],
        )
    }

    /// Create the genesis coinbase. Its identifier is a fixed sentinel and
    /// its output is never added to the UTXO set.
    pub fn new_genesis() -> Self {
        Self {
            id: GENESIS_TX_ID.to_string(),
            inputs: vec![TxInput::coinbase()],
            outputs: vec![TxOutput {
                value: GENESIS_ALLOCATION,
                address: GENESIS_ADDRESS.to_string(),
                script_pub: String::new(),
            }],
        }
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Check if this is the genesis sentinel coinbase
    pub fn is_genesis(&self) -> bool {
        self.id == GENESIS_TX_ID
    }

    /// Content hash of the transaction: hex SHA256 of the canonical form
    /// with all input signatures and public keys nulled. Stable across
    /// signing, so the id can be set at creation time.
    pub fn compute_id(&self) -> String {
        sha256_hex(&self.preimage(None, ""))
    }

    /// Total value across all outputs
    pub fn total_output(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// Signing preimage for one input: every input stripped of signature and
    /// public key, with the current input's public key field carrying the
    /// referenced output's script_pub
    pub fn signing_preimage(&self, input_index: usize, script_pub: &str) -> Vec<u8> {
        self.preimage(Some(input_index), script_pub)
    }

    fn preimage(&self, signing_index: Option<usize>, script_pub: &str) -> Vec<u8> {
        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| PreimageInput {
                tx_id: &input.tx_id,
                out_index: input.out_index,
                signature: None,
                pub_key: if signing_index == Some(i) {
                    Some(script_pub)
                } else {
                    None
                },
            })
            .collect();

        let preimage = Preimage {
            inputs,
            outputs: &self.outputs,
        };

        serde_json::to_vec(&preimage).expect("transaction preimage serialization cannot fail")
    }

    /// Verify the signatures of every signed input against the outputs they
    /// spend. `prev_txs` must map each referenced transaction id to the
    /// transaction that produced the spent output.
    ///
    /// Inputs carrying no signature at all are skipped; an input with only
    /// one of signature/public key present is rejected.
    pub fn verify_signatures(
        &self,
        prev_txs: &HashMap<String, Transaction>,
    ) -> Result<bool, String> {
        if self.is_coinbase() {
            return Ok(true);
        }

        for (i, input) in self.inputs.iter().enumerate() {
            let (sig_hex, key_hex) = match (&input.signature, &input.pub_key) {
                (None, None) => continue,
                (Some(s), Some(k)) => (s, k),
                _ => return Ok(false),
            };

            let prev_tx = prev_txs
                .get(&input.tx_id)
                .ok_or_else(|| format!("Previous transaction {} not found", input.tx_id))?;

            let out_index = usize::try_from(input.out_index)
                .map_err(|_| format!("Invalid output index {}", input.out_index))?;
            let prev_out = prev_tx
                .outputs
                .get(out_index)
                .ok_or_else(|| format!("Output {}[{}] not found", input.tx_id, input.out_index))?;

            let key_bytes = hex::decode(key_hex).map_err(|e| format!("Invalid public key: {}", e))?;

            // Single-key spend condition: the key must hash to the script_pub
            // the output was locked to
            if !prev_out.script_pub.is_empty()
                && hex::encode(sha256_bytes(&key_bytes)) != prev_out.script_pub
            {
                return Ok(false);
            }

            let sig_bytes = hex::decode(sig_hex).map_err(|e| format!("Invalid signature: {}", e))?;

            // Public key is the x || y coordinate concatenation
            let mut sec1 = Vec::with_capacity(65);
            sec1.push(0x04);
            sec1.extend_from_slice(&key_bytes);
            let verifying_key = match VerifyingKey::from_sec1_bytes(&sec1) {
                Ok(k) => k,
                Err(_) => return Ok(false),
            };

            let signature = match Signature::from_slice(&sig_bytes) {
                Ok(s) => s,
                Err(_) => return Ok(false),
            };

            let preimage = self.signing_preimage(i, &prev_out.script_pub);
            if verifying_key.verify(&preimage, &signature).is_err() {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_input() {
        let input = TxInput::coinbase();
        assert!(input.is_coinbase());
        assert_eq!(input.tx_id, "");
        assert_eq!(input.out_index, -1);
    }

    #[test]
    fn test_coinbase_transaction() {
        let tx = Transaction::new_coinbase("addr", Amount::from_whole(10));

        assert!(tx.is_coinbase());
        assert!(!tx.is_genesis());
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, Amount::from_whole(10));
        assert_eq!(tx.id.len(), 64);
    }

    #[test]
    fn test_genesis_sentinel() {
        let tx = Transaction::new_genesis();

        assert!(tx.is_coinbase());
        assert!(tx.is_genesis());
        assert_eq!(tx.id, GENESIS_TX_ID);
        assert_eq!(tx.outputs[0].address, GENESIS_ADDRESS);
        assert_eq!(tx.outputs[0].value, GENESIS_ALLOCATION);
    }

    #[test]
    fn test_id_deterministic() {
        let build = || {
            Transaction::new(
                vec![TxInput::new("abc".to_string(), 0)],
                vec![TxOutput::to_address(Amount::from_whole(3), "somebody")],
            )
        };

        assert_eq!(build().id, build().id);
    }

    #[test]
    fn test_id_stable_across_signing() {
        let mut tx = Transaction::new(
            vec![TxInput::new("abc".to_string(), 0)],
            vec![TxOutput::to_address(Amount::from_whole(3), "somebody")],
        );
        let id_before = tx.id.clone();

        tx.inputs[0].signature = Some("00".repeat(64));
        tx.inputs[0].pub_key = Some("11".repeat(64));

        assert_eq!(tx.compute_id(), id_before);
    }

    #[test]
    fn test_id_covers_contents() {
        let tx1 = Transaction::new(
            vec![TxInput::new("abc".to_string(), 0)],
            vec![TxOutput::to_address(Amount::from_whole(3), "somebody")],
        );
        let tx2 = Transaction::new(
            vec![TxInput::new("abc".to_string(), 0)],
            vec![TxOutput::to_address(Amount::from_whole(4), "somebody")],
        );

        assert_ne!(tx1.id, tx2.id);
    }

    #[test]
    fn test_total_output() {
        let tx = Transaction::new(
            vec![TxInput::new("abc".to_string(), 0)],
            vec![
                TxOutput::to_address(Amount::from_whole(3), "a"),
                TxOutput::to_address(Amount::from_whole(7), "b"),
            ],
        );

        assert_eq!(tx.total_output(), Amount::from_whole(10));
    }

    #[test]
    fn test_signing_preimage_differs_per_input() {
        let tx = Transaction::new(
            vec![
                TxInput::new("abc".to_string(), 0),
                TxInput::new("def".to_string(), 1),
            ],
            vec![TxOutput::to_address(Amount::from_whole(1), "somebody")],
        );

        let p0 = tx.signing_preimage(0, "aa");
        let p1 = tx.signing_preimage(1, "aa");
        assert_ne!(p0, p1);
    }

    #[test]
    fn test_verify_unsigned_inputs_skipped() {
        let tx = Transaction::new(
            vec![TxInput::new("abc".to_string(), 0)],
            vec![TxOutput::to_address(Amount::from_whole(1), "somebody")],
        );

        // No signatures attached, nothing to check
        assert!(tx.verify_signatures(&HashMap::new()).unwrap());
    }

    #[test]
    fn test_verify_half_signed_input_rejected() {
        let mut tx = Transaction::new(
            vec![TxInput::new("abc".to_string(), 0)],
            vec![TxOutput::to_address(Amount::from_whole(1), "somebody")],
        );
        tx.inputs[0].signature = Some("00".repeat(64));

        assert!(!tx.verify_signatures(&HashMap::new()).unwrap());
    }

    #[test]
    fn test_wire_round_trip() {
        let tx = Transaction::new_coinbase("miner", Amount::from_whole(10));

        let json = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, decoded);

        // Wire field names follow the node's JSON convention
        assert!(json.contains("\"txId\""));
        assert!(json.contains("\"outIndex\""));
        assert!(json.contains("\"scriptPub\""));
    }
}
