// Base58Check address encoding

use crate::core::{checksum, sha256_bytes};

/// Address version byte
pub const VERSION: u8 = 0x00;

/// Hash a public key for address derivation
pub fn hash_pub_key(pub_key: &[u8]) -> [u8; 32] {
    sha256_bytes(pub_key)
}

/// Derive the printable address for a public key:
/// Base58(version || SHA256(pub_key) || checksum)
pub fn derive(pub_key: &[u8]) -> String {
    let pubkey_hash = hash_pub_key(pub_key);

    let mut payload = Vec::with_capacity(1 + 32 + 4);
    payload.push(VERSION);
    payload.extend_from_slice(&pubkey_hash);

    let check = checksum(&payload);
    payload.extend_from_slice(&check);

    bs58::encode(payload).into_string()
}

/// Validate an address by recomputing its embedded checksum
pub fn validate(address: &str) -> bool {
    let payload = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    if payload.len() != 1 + 32 + 4 {
        return false;
    }

    let (versioned, embedded) = payload.split_at(payload.len() - 4);
    checksum(versioned) == embedded
}

/// Extract the public key hash embedded in a valid address.
/// Returns None for malformed addresses and sentinels like "unspendable".
pub fn pubkey_hash_of(address: &str) -> Option<Vec<u8>> {
    if !validate(address) {
        return None;
    }

    let payload = bs58::decode(address).into_vec().ok()?;
    Some(payload[1..payload.len() - 4].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_and_validate() {
        let address = derive(b"some public key bytes");
        assert!(validate(&address));
    }

    #[test]
    fn test_derive_deterministic() {
        assert_eq!(derive(b"key"), derive(b"key"));
        assert_ne!(derive(b"key"), derive(b"other key"));
    }

    #[test]
    fn test_validate_rejects_tampering() {
        let address = derive(b"some public key bytes");

        // Flip one character
        let mut chars: Vec<char> = address.chars().collect();
        chars[3] = if chars[3] == '2' { '3' } else { '2' };
        let tampered: String = chars.into_iter().collect();

        assert!(!validate(&tampered));
    }

    #[test]
    fn test_validate_rejects_sentinels() {
        assert!(!validate("unspendable"));
        assert!(!validate(""));
        assert!(!validate("not-base58-0OIl"));
    }

    #[test]
    fn test_pubkey_hash_round_trip() {
        let pub_key = b"some public key bytes";
        let address = derive(pub_key);

        let embedded = pubkey_hash_of(&address).unwrap();
        assert_eq!(embedded, hash_pub_key(pub_key).to_vec());

        assert!(pubkey_hash_of("unspendable").is_none());
    }
}
