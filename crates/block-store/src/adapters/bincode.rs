//! Default record serializer using bincode.

use crate::domain::entities::{BlockMeta, StoreState, StoredBlock};
use crate::domain::errors::SerializationError;
use crate::ports::outbound::BlockSerializer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::Commit;

/// Bincode encoding for every record type.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeBlockSerializer;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    ::bincode::serialize(value).map_err(|e| SerializationError {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, SerializationError> {
    ::bincode::deserialize(data).map_err(|e| SerializationError {
        message: e.to_string(),
    })
}

impl BlockSerializer for BincodeBlockSerializer {
    fn serialize_block(&self, block: &StoredBlock) -> Result<Vec<u8>, SerializationError> {
        encode(block)
    }

    fn deserialize_block(&self, data: &[u8]) -> Result<StoredBlock, SerializationError> {
        decode(data)
    }

    fn serialize_meta(&self, meta: &BlockMeta) -> Result<Vec<u8>, SerializationError> {
        encode(meta)
    }

    fn deserialize_meta(&self, data: &[u8]) -> Result<BlockMeta, SerializationError> {
        decode(data)
    }

    fn serialize_commit(&self, commit: &Commit) -> Result<Vec<u8>, SerializationError> {
        encode(commit)
    }

    fn deserialize_commit(&self, data: &[u8]) -> Result<Commit, SerializationError> {
        decode(data)
    }

    fn serialize_state(&self, state: &StoreState) -> Result<Vec<u8>, SerializationError> {
        encode(state)
    }

    fn deserialize_state(&self, data: &[u8]) -> Result<StoreState, SerializationError> {
        decode(data)
    }
}
