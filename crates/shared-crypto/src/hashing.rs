//! # SHA-256 Hashing
//!
//! One-shot and incremental SHA-256 plus the binary Merkle root used for
//! block part sets.

use sha2::{Digest, Sha256};

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

/// Stateful SHA-256 hasher.
#[derive(Default)]
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return hash.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash the concatenation of multiple inputs.
pub fn sha256_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Sha256Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize()
}

/// Compute the Merkle root over a list of leaves.
///
/// Leaves are hashed as `H(0x00 || leaf)` and inner nodes as
/// `H(0x01 || left || right)`. An odd node at any level is promoted
/// unchanged. The root of an empty list is the hash of the empty string.
pub fn merkle_root(leaves: &[&[u8]]) -> Hash {
    if leaves.is_empty() {
        return sha256(&[]);
    }

    let mut level: Vec<Hash> = leaves
        .iter()
        .map(|leaf| sha256_many(&[&[LEAF_PREFIX], leaf]))
        .collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => sha256_many(&[&[INNER_PREFIX], left, right]),
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }

    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let hash = sha256(b"abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_many_matches_concatenation() {
        assert_eq!(sha256_many(&[b"ab", b"c"]), sha256(b"abc"));
    }

    #[test]
    fn test_merkle_root_single_leaf_is_domain_separated() {
        let root = merkle_root(&[b"part"]);
        assert_ne!(root, sha256(b"part"));
        assert_eq!(root, sha256_many(&[&[LEAF_PREFIX], b"part"]));
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let a = merkle_root(&[b"a", b"b", b"c"]);
        let b = merkle_root(&[b"c", b"b", b"a"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_merkle_root_empty() {
        assert_eq!(merkle_root(&[]), sha256(&[]));
    }
}
