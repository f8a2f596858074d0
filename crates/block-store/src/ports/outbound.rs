//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the block store.

use crate::domain::entities::{BlockMeta, StoreState, StoredBlock};
use crate::domain::errors::{KVStoreError, SerializationError};
use shared_types::Commit;

/// Abstract interface for key-value database operations.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either all operations in the batch are applied, or none are.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key
        key: Vec<u8>,
    },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Encoding of store records.
pub trait BlockSerializer: Send + Sync {
    /// Encode a stored block.
    fn serialize_block(&self, block: &StoredBlock) -> Result<Vec<u8>, SerializationError>;
    /// Decode a stored block.
    fn deserialize_block(&self, data: &[u8]) -> Result<StoredBlock, SerializationError>;

    /// Encode a meta record.
    fn serialize_meta(&self, meta: &BlockMeta) -> Result<Vec<u8>, SerializationError>;
    /// Decode a meta record.
    fn deserialize_meta(&self, data: &[u8]) -> Result<BlockMeta, SerializationError>;

    /// Encode a commit.
    fn serialize_commit(&self, commit: &Commit) -> Result<Vec<u8>, SerializationError>;
    /// Decode a commit.
    fn deserialize_commit(&self, data: &[u8]) -> Result<Commit, SerializationError>;

    /// Encode the store state.
    fn serialize_state(&self, state: &StoreState) -> Result<Vec<u8>, SerializationError>;
    /// Decode the store state.
    fn deserialize_state(&self, data: &[u8]) -> Result<StoreState, SerializationError>;
}
