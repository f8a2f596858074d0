//! # Inbound Ports (Driving Ports)
//!
//! The API the sync engine and request handlers use.

use crate::domain::entities::BlockMeta;
use crate::domain::errors::StorageError;
use shared_types::{Block, Commit};

/// Height-indexed block store.
///
/// Writes come from a single writer; reads may run concurrently and observe
/// a height either entirely or not at all.
pub trait BlockStore: Send + Sync {
    /// Persist `block` together with the commit that finalized it.
    ///
    /// ## Errors
    ///
    /// - `NonContiguousHeight`: the block does not extend the tip
    /// - `SeenCommitMismatch`: the commit names another height
    /// - `BlockTooLarge`: encoding exceeds the configured limit
    fn save_block(&self, block: &Block, seen_commit: &Commit) -> Result<(), StorageError>;

    /// Block at `height`, if stored.
    fn load_block(&self, height: u64) -> Result<Option<Block>, StorageError>;

    /// Meta record at `height`, if stored.
    fn load_block_meta(&self, height: u64) -> Result<Option<BlockMeta>, StorageError>;

    /// Commit that finalized the block at `height`, if stored.
    fn load_seen_commit(&self, height: u64) -> Result<Option<Commit>, StorageError>;

    /// Highest stored height, 0 when empty.
    fn height(&self) -> u64;

    /// Lowest stored height, 0 when empty.
    fn base(&self) -> u64;
}
