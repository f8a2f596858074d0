//! Port implementations shipped with the store.

pub mod bincode;
pub mod memory;

pub use self::bincode::BincodeBlockSerializer;
pub use memory::InMemoryKVStore;
