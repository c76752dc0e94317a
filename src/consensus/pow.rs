// Proof of work

use crate::core::{Amount, Block, COIN};

/// Required count of leading hex zeros on a block hash
pub const DIFFICULTY: usize = 4;

/// Coins minted by each block's coinbase, before fees
pub const MINING_REWARD: Amount = Amount(10 * COIN);

/// Check that a hex hash string satisfies the difficulty target
pub fn meets_difficulty(hash: &str) -> bool {
    hash.len() >= DIFFICULTY && hash.bytes().take(DIFFICULTY).all(|b| b == b'0')
}

/// Check a block's stored proof: the hash must match the block's canonical
/// serialization and satisfy the difficulty target
pub fn is_valid_proof(block: &Block) -> bool {
    meets_difficulty(&block.hash) && block.hash == block.compute_hash()
}

/// Brute-force the nonce until the block's hash satisfies the difficulty
/// target. Returns the number of attempts.
pub fn seal(block: &mut Block) -> u64 {
    let mut attempts = 0u64;
    loop {
        block.hash = block.compute_hash();
        attempts += 1;
        if meets_difficulty(&block.hash) {
            return attempts;
        }
        block.nonce += 1;
    }
}
