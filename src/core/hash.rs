// Hashing utilities

use sha2::{Digest, Sha256};

/// Single SHA256 hash
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// SHA256 hash as a lowercase hex string (64 chars)
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_bytes(data))
}

/// Address checksum: first 4 bytes of SHA256(SHA256(payload))
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let first = sha256_bytes(payload);
    let second = sha256_bytes(&first);
    let mut result = [0u8; 4];
    result.copy_from_slice(&second[..4]);
    result
}
