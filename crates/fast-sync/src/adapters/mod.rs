//! Adapters: in-process implementations of the outbound ports.

pub mod codec;
pub mod executor;
pub mod memory_network;
pub mod signature_verifier;

pub use codec::{SyncCodec, MAX_MSG_SIZE_BYTES};
pub use executor::DeterministicExecutor;
pub use memory_network::{MemoryNetwork, MemoryTransport};
pub use signature_verifier::Ed25519SignatureVerifier;
