//! Domain layer: pool, peer lifecycle, verification rules and messages.
//! Nothing here performs I/O or reads the clock.

pub mod errors;
pub mod messages;
pub mod peer;
pub mod pool;
pub mod state;
pub mod verification;

pub use errors::{
    CodecError, ExecutionError, PeerFault, SyncError, TransportError, VerificationError,
};
pub use messages::SyncMessage;
pub use peer::{IllegalTransition, PeerPhase, PeerState};
pub use pool::{
    BlockPool, BufferedBlock, DeliverOutcome, PoolConfig, PoolStatus, ReadyBlock, RequestIntent,
    ScheduleOutcome,
};
pub use state::{ChainState, Genesis};
pub use verification::{verify_block, verify_commit, verify_linkage, Blame, VerificationFailure};
