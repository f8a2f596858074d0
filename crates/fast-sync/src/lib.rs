//! # Fast Sync
//!
//! Catches a lagging node up with the chain held by its peers before it
//! joins live consensus.
//!
//! ## Architecture
//!
//! ```text
//! transport events ──→ SyncReactor ──→ BlockPool (peers, pending, buffer)
//!                          │                 │ next_ready()
//!                          │                 ↓
//!                          │        VerifyApplyPipeline ──→ BlockExecutor
//!                          │                 │
//!                          │                 └──→ BlockStore
//!                          └──→ ConsensusHandoff (once, when caught up)
//! ```
//!
//! ## Safety and Liveness
//!
//! | Property | Enforced by |
//! |----------|-------------|
//! | One request per height and per peer | `BlockPool::schedule` |
//! | Strict ascending apply order | `BlockPool::next_ready` / `mark_applied` |
//! | No invalid block applied | `domain::verification` before `BlockExecutor::apply` |
//! | Stalled peers dropped | request timeouts with consecutive-timeout eviction |
//! | One hand-off to consensus | one-time `caught_up_event` latch |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pool, peer lifecycle, verification, messages (no I/O)
//! - `ports/` - Inbound API and outbound collaborator traits
//! - `application/` - Reactor and verify-apply pipeline
//! - `adapters/` - In-memory network, codec, ed25519 verifier, executor
//! - `config.rs` - Tunables

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{
    DeterministicExecutor, Ed25519SignatureVerifier, MemoryNetwork, MemoryTransport, SyncCodec,
    MAX_MSG_SIZE_BYTES,
};
pub use application::{DrainReport, SyncPorts, SyncReactor, VerifyApplyPipeline};
pub use config::FastSyncConfig;
pub use domain::{
    BlockPool, ChainState, CodecError, DeliverOutcome, ExecutionError, Genesis, PeerFault,
    PeerPhase, PeerState, PoolStatus, ScheduleOutcome, SyncError, SyncMessage, TransportError,
    VerificationError,
};
pub use ports::inbound::{SyncApi, SyncStatus};
pub use ports::outbound::{
    BlockExecutor, ConsensusHandoff, SignatureVerifier, Transport, TransportEvent,
};
