//! # Block Store
//!
//! Durable, height-indexed repository of committed blocks and the commits
//! that finalized them.
//!
//! ## Domain Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Contiguous heights | A block at `h` is accepted only when the tip is `h-1` |
//! | Immutability | A stored height is never overwritten or deleted |
//! | Atomic writes | Block, meta, seen commit and tip pointer land in one batch |
//! | Data integrity | A checksum is verified on every block read |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Records, key layout, errors
//! - `ports/` - `BlockStore` API (inbound), KV and serializer SPI (outbound)
//! - `adapters/` - In-memory KV store, bincode serializer
//! - `service.rs` - `BlockStoreService` implementing the API
//!
//! ## Usage
//!
//! ```ignore
//! use block_store::{BlockStore, BlockStoreService, StoreConfig};
//!
//! let store = BlockStoreService::new_in_memory(StoreConfig::default());
//! store.save_block(&block, &seen_commit)?;
//! assert_eq!(store.height(), block.height());
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{BincodeBlockSerializer, InMemoryKVStore};
pub use config::StoreConfig;
pub use domain::entities::{BlockMeta, KeyPrefix, StoreState, StoredBlock};
pub use domain::errors::{KVStoreError, SerializationError, StorageError};
pub use ports::inbound::BlockStore;
pub use ports::outbound::{BatchOperation, BlockSerializer, KeyValueStore};
pub use service::BlockStoreService;
