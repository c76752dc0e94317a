// Merkle tree and inclusion proofs

use crate::core::sha256_bytes;

/// Binary SHA256 hash tree over a sequence of byte strings.
///
/// Levels are stored bottom-up as flat vectors: the parent of the node at
/// (level, pos) sits at (level + 1, pos / 2). A level with an odd node count
/// pairs its last node with itself.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

/// Inclusion proof: the sibling hashes from a leaf up to the root, with a
/// direction bit per step (true = sibling on the right)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: [u8; 32],
    pub siblings: Vec<[u8; 32]>,
    pub path: Vec<bool>,
}

impl MerkleTree {
    /// Build a tree over the given byte strings, in order.
    /// An empty input has no tree (and therefore no root).
    pub fn new<T: AsRef<[u8]>>(data: &[T]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let leaves: Vec<[u8; 32]> = data.iter().map(|d| sha256_bytes(d.as_ref())).collect();
        let mut levels = vec![leaves];

        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let current = levels.last().expect("levels is never empty");
            let mut next = Vec::with_capacity((current.len() + 1) / 2);

            for chunk in current.chunks(2) {
                let left = chunk[0];
                // Odd count: the last node is paired with itself
                let right = chunk.get(1).copied().unwrap_or(left);

                let mut combined = [0u8; 64];
                combined[..32].copy_from_slice(&left);
                combined[32..].copy_from_slice(&right);
                next.push(sha256_bytes(&combined));
            }

            levels.push(next);
        }

        Some(Self { levels })
    }

    /// The tree root
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().expect("levels is never empty")[0]
    }

    /// The tree root as a hex string
    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    /// Number of leaves the tree was built over
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Generate an inclusion proof for a member byte string.
    /// Fails if the data's hash is not among the leaves.
    pub fn generate_proof(&self, data: &[u8]) -> Result<MerkleProof, String> {
        let leaf_hash = sha256_bytes(data);

        let leaf_index = self.levels[0]
            .iter()
            .position(|h| *h == leaf_hash)
            .ok_or_else(|| "data not found in tree".to_string())?;

        let mut siblings = Vec::new();
        let mut path = Vec::new();
        let mut pos = leaf_index;

        for level in &self.levels[..self.levels.len() - 1] {
            if pos % 2 == 0 {
                // Left child; sibling on the right, or the node itself when
                // it was duplicated
                let sibling = level.get(pos + 1).copied().unwrap_or(level[pos]);
                siblings.push(sibling);
                path.push(true);
            } else {
                siblings.push(level[pos - 1]);
                path.push(false);
            }
            pos /= 2;
        }

        Ok(MerkleProof {
            leaf_index,
            leaf_hash,
            siblings,
            path,
        })
    }
}

/// Verify an inclusion proof against an expected root, using only the data,
/// the proof and the root
pub fn verify_proof(data: &[u8], proof: &MerkleProof, root: &[u8; 32]) -> bool {
    if proof.siblings.len() != proof.path.len() {
        return false;
    }

    let mut current = sha256_bytes(data);
    if current != proof.leaf_hash {
        return false;
    }

    for (sibling, sibling_is_right) in proof.siblings.iter().zip(&proof.path) {
        let mut combined = [0u8; 64];
        if *sibling_is_right {
            combined[..32].copy_from_slice(&current);
            combined[32..].copy_from_slice(sibling);
        } else {
            combined[..32].copy_from_slice(sibling);
            combined[32..].copy_from_slice(&current);
        }
        current = sha256_bytes(&combined);
    }

    current == *root
}
