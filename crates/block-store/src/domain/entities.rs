//! # Store Records
//!
//! What the store persists per height and the key layout it uses.

use serde::{Deserialize, Serialize};
use shared_types::{Block, BlockHeader, BlockId};

/// Summary of a stored block, cheap to load without the transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Id of the block.
    pub block_id: BlockId,
    /// The block header.
    pub header: BlockHeader,
    /// Size of the canonical encoding.
    pub block_size: usize,
    /// Number of transactions.
    pub num_txs: usize,
}

impl BlockMeta {
    /// Build the meta record for a block.
    pub fn from_block(block: &Block) -> Self {
        Self {
            block_id: block.block_id(),
            header: block.header.clone(),
            block_size: block.canonical_bytes().len(),
            num_txs: block.txs.len(),
        }
    }
}

/// Block as written to the KV store, with an integrity checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    /// The block.
    pub block: Block,
    /// CRC32 over the canonical block encoding.
    pub checksum: u32,
}

impl StoredBlock {
    /// Wrap a block, computing its checksum.
    pub fn new(block: Block) -> Self {
        let checksum = Self::compute_checksum(&block);
        Self { block, checksum }
    }

    /// CRC32 over the canonical block encoding.
    pub fn compute_checksum(block: &Block) -> u32 {
        crc32fast::hash(&block.canonical_bytes())
    }
}

/// Persisted range of stored heights. `height == 0` means empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreState {
    /// Lowest stored height.
    pub base: u64,
    /// Highest stored height.
    pub height: u64,
}

/// Key prefixes of the KV layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// height → `StoredBlock`
    Block,
    /// height → `BlockMeta`
    Meta,
    /// height → seen `Commit`
    SeenCommit,
    /// singleton → `StoreState`
    State,
}

impl KeyPrefix {
    /// Get the byte prefix for this key type.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Block => b"b:",
            KeyPrefix::Meta => b"m:",
            KeyPrefix::SeenCommit => b"c:",
            KeyPrefix::State => b"s:",
        }
    }

    /// Key for `height` under this prefix.
    pub fn height_key(&self, height: u64) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(&height.to_be_bytes());
        key
    }

    /// Key of the store state record.
    pub fn state_key() -> Vec<u8> {
        KeyPrefix::State.as_bytes().to_vec()
    }
}
