// Key management and transaction signing

use crate::core::Transaction;
use crate::wallet::address;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use std::collections::HashMap;

/// Wallet - a P-256 key pair and its derived address
///
/// The public key is the x || y coordinate concatenation (64 bytes);
/// signatures are the r || s concatenation (64 bytes).
pub struct Wallet {
    signing_key: SigningKey,
    pub public_key: Vec<u8>,
    pub address: String,
}

impl Wallet {
    /// Generate a fresh key pair
    pub fn new() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);

        let point = signing_key.verifying_key().to_encoded_point(false);
        let public_key = point.as_bytes()[1..].to_vec();

        let address = address::derive(&public_key);

        Self {
            signing_key,
            public_key,
            address,
        }
    }

    /// Sign every non-coinbase input of a transaction.
    ///
    /// The per-input preimage is the transaction with all signatures
    /// stripped and the current input's public key field set to the
    /// referenced output's script_pub. `prev_txs` must contain each
    /// referenced transaction; a missing entry is a caller error.
    pub fn sign(
        &self,
        tx: &mut Transaction,
        prev_txs: &HashMap<String, Transaction>,
    ) -> Result<(), String> {
        for i in 0..tx.inputs.len() {
            if tx.inputs[i].is_coinbase() {
                continue;
            }

            let prev_tx = prev_txs
                .get(&tx.inputs[i].tx_id)
                .ok_or_else(|| format!("Previous transaction {} not found", tx.inputs[i].tx_id))?;

            let out_index = usize::try_from(tx.inputs[i].out_index)
                .map_err(|_| format!("Invalid output index {}", tx.inputs[i].out_index))?;
            let script_pub = prev_tx
                .outputs
                .get(out_index)
                .ok_or_else(|| {
                    format!("Output {}[{}] not found", tx.inputs[i].tx_id, out_index)
                })?
                .script_pub
                .clone();

            let preimage = tx.signing_preimage(i, &script_pub);
            let signature: Signature = self.signing_key.sign(&preimage);

            tx.inputs[i].signature = Some(hex::encode(signature.to_bytes()));
            tx.inputs[i].pub_key = Some(hex::encode(&self.public_key));
        }

        Ok(())
    }

    /// Verify a transaction's input signatures against the transactions
    /// that produced the spent outputs
    pub fn verify(
        tx: &Transaction,
        prev_txs: &HashMap<String, Transaction>,
    ) -> Result<bool, String> {
        tx.verify_signatures(prev_txs)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Wallets - address-keyed wallet collection owned by a node
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            wallets: HashMap::new(),
        }
    }

    /// Generate a wallet and return its address
    pub fn create_wallet(&mut self) -> String {
        let wallet = Wallet::new();
        let address = wallet.address.clone();
        self.wallets.insert(address.clone(), wallet);
        address
    }

    /// Look up a wallet by address
    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// All known addresses
    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.wallets.len()
    }
}

impl Default for Wallets {
    fn default() -> Self {
        Self::new()
    }
}
