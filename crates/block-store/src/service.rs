//! # Block Store Service
//!
//! Implements [`BlockStore`] over any [`KeyValueStore`].
//!
//! The KV backend and the cached tip live behind one `RwLock`: a save holds
//! the write lock across the batch and the tip update, so a reader sees a
//! height either fully written or absent.

use crate::adapters::{BincodeBlockSerializer, InMemoryKVStore};
use crate::config::StoreConfig;
use crate::domain::entities::{BlockMeta, KeyPrefix, StoreState, StoredBlock};
use crate::domain::errors::StorageError;
use crate::ports::inbound::BlockStore;
use crate::ports::outbound::{BatchOperation, BlockSerializer, KeyValueStore};
use parking_lot::RwLock;
use shared_types::{Block, Commit};
use tracing::{debug, info};

struct Inner<KV> {
    kv: KV,
    state: StoreState,
}

/// Block store over a KV backend.
pub struct BlockStoreService<KV: KeyValueStore, BS: BlockSerializer = BincodeBlockSerializer> {
    inner: RwLock<Inner<KV>>,
    serializer: BS,
    config: StoreConfig,
}

impl BlockStoreService<InMemoryKVStore, BincodeBlockSerializer> {
    /// Empty in-memory store.
    pub fn new_in_memory(config: StoreConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                kv: InMemoryKVStore::new(),
                state: StoreState::default(),
            }),
            serializer: BincodeBlockSerializer,
            config,
        }
    }
}

impl<KV: KeyValueStore, BS: BlockSerializer> BlockStoreService<KV, BS> {
    /// Open a store over an existing backend, restoring the stored range.
    pub fn open(kv: KV, serializer: BS, config: StoreConfig) -> Result<Self, StorageError> {
        let state = match kv.get(&KeyPrefix::state_key())? {
            Some(bytes) => serializer.deserialize_state(&bytes)?,
            None => StoreState::default(),
        };

        if state.height > 0 {
            info!(
                base = state.base,
                height = state.height,
                "[block-store] Opened existing store"
            );
        }

        Ok(Self {
            inner: RwLock::new(Inner { kv, state }),
            serializer,
            config,
        })
    }

    /// Consume the service and hand back the backend.
    pub fn into_kv(self) -> KV {
        self.inner.into_inner().kv
    }

    /// Stored range.
    pub fn state(&self) -> StoreState {
        self.inner.read().state
    }

    fn load_raw(&self, prefix: KeyPrefix, height: u64) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.read();
        if height == 0 || height < inner.state.base || height > inner.state.height {
            return Ok(None);
        }
        Ok(inner.kv.get(&prefix.height_key(height))?)
    }
}

impl<KV: KeyValueStore, BS: BlockSerializer> BlockStore for BlockStoreService<KV, BS> {
    fn save_block(&self, block: &Block, seen_commit: &Commit) -> Result<(), StorageError> {
        let height = block.height();
        if height == 0 {
            return Err(StorageError::ZeroHeight);
        }
        if seen_commit.height != height {
            return Err(StorageError::SeenCommitMismatch {
                block_height: height,
                commit_height: seen_commit.height,
            });
        }

        let meta = BlockMeta::from_block(block);
        if meta.block_size > self.config.max_block_size_bytes {
            return Err(StorageError::BlockTooLarge {
                size: meta.block_size,
                max_size: self.config.max_block_size_bytes,
            });
        }

        let mut inner = self.inner.write();
        let expected = inner.state.height + 1;
        if inner.state.height > 0 && height != expected {
            return Err(StorageError::NonContiguousHeight {
                expected,
                got: height,
            });
        }

        let next_state = StoreState {
            base: if inner.state.height == 0 {
                height
            } else {
                inner.state.base
            },
            height,
        };

        let operations = vec![
            BatchOperation::put(
                KeyPrefix::Block.height_key(height),
                self.serializer
                    .serialize_block(&StoredBlock::new(block.clone()))?,
            ),
            BatchOperation::put(
                KeyPrefix::Meta.height_key(height),
                self.serializer.serialize_meta(&meta)?,
            ),
            BatchOperation::put(
                KeyPrefix::SeenCommit.height_key(height),
                self.serializer.serialize_commit(seen_commit)?,
            ),
            BatchOperation::put(
                KeyPrefix::state_key(),
                self.serializer.serialize_state(&next_state)?,
            ),
        ];

        inner.kv.atomic_batch_write(operations)?;
        inner.state = next_state;

        debug!(
            height,
            txs = block.txs.len(),
            size = meta.block_size,
            "[block-store] Stored block"
        );
        Ok(())
    }

    fn load_block(&self, height: u64) -> Result<Option<Block>, StorageError> {
        let Some(bytes) = self.load_raw(KeyPrefix::Block, height)? else {
            return Ok(None);
        };
        let stored = self.serializer.deserialize_block(&bytes)?;

        if self.config.verify_checksums {
            let actual = StoredBlock::compute_checksum(&stored.block);
            if actual != stored.checksum {
                return Err(StorageError::DataCorruption {
                    height,
                    expected: stored.checksum,
                    actual,
                });
            }
        }
        Ok(Some(stored.block))
    }

    fn load_block_meta(&self, height: u64) -> Result<Option<BlockMeta>, StorageError> {
        self.load_raw(KeyPrefix::Meta, height)?
            .map(|bytes| self.serializer.deserialize_meta(&bytes))
            .transpose()
            .map_err(StorageError::from)
    }

    fn load_seen_commit(&self, height: u64) -> Result<Option<Commit>, StorageError> {
        self.load_raw(KeyPrefix::SeenCommit, height)?
            .map(|bytes| self.serializer.deserialize_commit(&bytes))
            .transpose()
            .map_err(StorageError::from)
    }

    fn height(&self) -> u64 {
        self.inner.read().state.height
    }

    fn base(&self) -> u64 {
        self.inner.read().state.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockHeader, BlockId};
    use std::sync::Arc;

    fn block(height: u64) -> Block {
        Block {
            header: BlockHeader {
                chain_id: "store-test".into(),
                height,
                time: height * 1_000,
                ..Default::default()
            },
            txs: vec![format!("tx-{height}").into_bytes()],
        }
    }

    fn commit_for(block: &Block) -> Commit {
        Commit {
            height: block.height(),
            round: 0,
            block_id: block.block_id(),
            signatures: vec![],
        }
    }

    fn store_with(heights: std::ops::RangeInclusive<u64>) -> BlockStoreService<InMemoryKVStore> {
        let store = BlockStoreService::new_in_memory(StoreConfig::for_testing());
        for h in heights {
            let b = block(h);
            store.save_block(&b, &commit_for(&b)).unwrap();
        }
        store
    }

    #[test]
    fn test_empty_store() {
        let store = store_with(1..=0);
        assert_eq!(store.height(), 0);
        assert_eq!(store.base(), 0);
        assert_eq!(store.load_block(1).unwrap(), None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = store_with(1..=3);

        assert_eq!(store.height(), 3);
        assert_eq!(store.base(), 1);
        assert_eq!(store.load_block(2).unwrap(), Some(block(2)));

        let meta = store.load_block_meta(3).unwrap().unwrap();
        assert_eq!(meta.block_id, block(3).block_id());
        assert_eq!(meta.num_txs, 1);

        let commit = store.load_seen_commit(1).unwrap().unwrap();
        assert_eq!(commit.block_id, block(1).block_id());
    }

    #[test]
    fn test_heights_beyond_tip_are_absent() {
        let store = store_with(1..=5);
        assert_eq!(store.load_block(6).unwrap(), None);
        assert_eq!(store.load_block_meta(100).unwrap(), None);
        assert_eq!(store.load_seen_commit(0).unwrap(), None);
    }

    #[test]
    fn test_rejects_gap() {
        let store = store_with(1..=2);
        let b = block(4);
        assert_eq!(
            store.save_block(&b, &commit_for(&b)),
            Err(StorageError::NonContiguousHeight {
                expected: 3,
                got: 4
            })
        );
        assert_eq!(store.height(), 2);
    }

    #[test]
    fn test_rejects_overwrite() {
        let store = store_with(1..=2);
        let b = block(2);
        assert!(matches!(
            store.save_block(&b, &commit_for(&b)),
            Err(StorageError::NonContiguousHeight { .. })
        ));
    }

    #[test]
    fn test_rejects_mismatched_seen_commit() {
        let store = store_with(1..=0);
        let b = block(1);
        let mut commit = commit_for(&b);
        commit.height = 7;
        assert_eq!(
            store.save_block(&b, &commit),
            Err(StorageError::SeenCommitMismatch {
                block_height: 1,
                commit_height: 7
            })
        );
        assert_eq!(store.height(), 0);
    }

    #[test]
    fn test_rejects_oversized_block() {
        let store = BlockStoreService::new_in_memory(StoreConfig {
            max_block_size_bytes: 64,
            verify_checksums: true,
        });
        let mut b = block(1);
        b.txs = vec![vec![0u8; 128]];
        assert!(matches!(
            store.save_block(&b, &commit_for(&b)),
            Err(StorageError::BlockTooLarge { .. })
        ));
    }

    #[test]
    fn test_first_block_sets_base() {
        let store = store_with(1..=0);
        let b = block(40);
        store.save_block(&b, &commit_for(&b)).unwrap();
        assert_eq!(store.base(), 40);
        assert_eq!(store.height(), 40);
        assert_eq!(store.load_block(39).unwrap(), None);
    }

    #[test]
    fn test_reopen_restores_range() {
        let kv = store_with(1..=4).into_kv();
        let reopened =
            BlockStoreService::open(kv, BincodeBlockSerializer, StoreConfig::for_testing())
                .unwrap();
        assert_eq!(reopened.height(), 4);
        assert_eq!(reopened.base(), 1);
        assert_eq!(reopened.load_block(4).unwrap(), Some(block(4)));
    }

    #[test]
    fn test_corrupted_block_detected_on_read() {
        let mut kv = store_with(1..=1).into_kv();
        let tampered = StoredBlock {
            block: block(1),
            checksum: 0xdead_beef,
        };
        kv.put_raw(
            &KeyPrefix::Block.height_key(1),
            &bincode::serialize(&tampered).unwrap(),
        );

        let store =
            BlockStoreService::open(kv, BincodeBlockSerializer, StoreConfig::for_testing())
                .unwrap();
        assert!(matches!(
            store.load_block(1),
            Err(StorageError::DataCorruption { height: 1, .. })
        ));
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_height() {
        let store = Arc::new(store_with(1..=0));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for h in 1..=200 {
                    let b = block(h);
                    store.save_block(&b, &commit_for(&b)).unwrap();
                }
            })
        };

        for _ in 0..500 {
            let h = store.height();
            if h > 0 {
                assert!(store.load_block(h).unwrap().is_some());
                assert!(store.load_seen_commit(h).unwrap().is_some());
            }
        }
        writer.join().unwrap();
        assert_eq!(store.height(), 200);
    }
}
