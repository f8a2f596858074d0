//! Crypto error types.

use thiserror::Error;

/// Key and signature errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The signature does not match the key and message.
    #[error("Signature does not verify")]
    SignatureVerificationFailed,

    /// The bytes are not a point on the curve.
    #[error("Public key is not a valid curve point")]
    InvalidPublicKey,

    /// Wrong number of key bytes.
    #[error("Key is {actual} bytes, expected {expected}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Length given
        actual: usize,
    },
}
