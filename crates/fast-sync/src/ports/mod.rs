//! Ports: the engine's API and the collaborators it drives.

pub mod inbound;
pub mod outbound;

pub use inbound::{SyncApi, SyncStatus};
pub use outbound::{
    BlockExecutor, ConsensusHandoff, SignatureVerifier, Transport, TransportEvent,
};
