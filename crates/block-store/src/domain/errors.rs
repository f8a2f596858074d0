//! # Domain Errors
//!
//! Error types for the block store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The block does not extend the current tip.
    #[error("Non-contiguous block: expected height {expected}, got {got}")]
    NonContiguousHeight {
        /// Next height the store accepts
        expected: u64,
        /// Height of the rejected block
        got: u64,
    },

    /// Height zero is never a valid block height.
    #[error("Block height must be at least 1")]
    ZeroHeight,

    /// The seen commit does not finalize the block being saved.
    #[error("Seen commit for height {commit_height} does not finalize block {block_height}")]
    SeenCommitMismatch {
        /// Height of the block
        block_height: u64,
        /// Height named by the commit
        commit_height: u64,
    },

    /// Block exceeds maximum size limit.
    #[error("Block too large: {size} bytes (max {max_size})")]
    BlockTooLarge {
        /// Encoded size
        size: usize,
        /// Configured limit
        max_size: usize,
    },

    /// Checksum mismatch on read.
    #[error("Data corruption at height {height}: expected checksum {expected}, got {actual}")]
    DataCorruption {
        /// Height of the corrupted record
        height: u64,
        /// Stored checksum
        expected: u32,
        /// Recomputed checksum
        actual: u32,
    },

    /// Underlying KV store failure.
    #[error("Database error: {message}")]
    DatabaseError {
        /// Backend message
        message: String,
    },

    /// Encoding or decoding failure.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Serializer message
        message: String,
    },
}

/// Key-value backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError {
        /// Backend message
        message: String,
    },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError {
        /// Backend message
        message: String,
    },
}

impl From<KVStoreError> for StorageError {
    fn from(err: KVStoreError) -> Self {
        StorageError::DatabaseError {
            message: err.to_string(),
        }
    }
}

/// Serializer failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Serialization error: {message}")]
pub struct SerializationError {
    /// Serializer message
    pub message: String,
}

impl From<SerializationError> for StorageError {
    fn from(err: SerializationError) -> Self {
        StorageError::SerializationError {
            message: err.message,
        }
    }
}
