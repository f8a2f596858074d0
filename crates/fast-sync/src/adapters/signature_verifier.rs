//! Ed25519 adapter for [`SignatureVerifier`].

use crate::ports::outbound::SignatureVerifier;
use shared_crypto::{Ed25519PublicKey, Ed25519Signature};
use shared_types::{PublicKey, Signature};

/// Verifies validator precommits with ed25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519SignatureVerifier;

impl SignatureVerifier for Ed25519SignatureVerifier {
    fn verify(&self, pub_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = Ed25519PublicKey::from_bytes(*pub_key) else {
            return false;
        };
        key.verify(message, &Ed25519Signature::from_bytes(*signature))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::Ed25519KeyPair;

    #[test]
    fn test_accepts_valid_signature() {
        let keypair = Ed25519KeyPair::from_seed([5u8; 32]);
        let sig = keypair.sign(b"precommit").to_bytes();
        let key = *keypair.public_key().as_bytes();
        assert!(Ed25519SignatureVerifier.verify(&key, b"precommit", &sig));
        assert!(!Ed25519SignatureVerifier.verify(&key, b"other", &sig));
    }

    #[test]
    fn test_rejects_other_key() {
        let signer = Ed25519KeyPair::from_seed([5u8; 32]);
        let other = Ed25519KeyPair::from_seed([6u8; 32]);
        let sig = signer.sign(b"precommit").to_bytes();
        assert!(!Ed25519SignatureVerifier.verify(
            other.public_key().as_bytes(),
            b"precommit",
            &sig
        ));
    }
}
