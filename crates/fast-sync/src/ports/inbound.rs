//! Inbound ports (API) for the fast-sync engine.

use crate::domain::{ChainState, PoolStatus};
use serde::Serialize;

/// Progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Pool progress.
    pub pool: PoolStatus,
    /// Highest height in the local store.
    pub store_height: u64,
    /// Blocks applied since start.
    pub blocks_synced: u64,
    /// True until the hand-off to consensus.
    pub syncing: bool,
}

/// Read-side API of the engine.
pub trait SyncApi: Send + Sync {
    /// Progress snapshot.
    fn status(&self) -> SyncStatus;

    /// True until the engine hands over to consensus.
    fn is_syncing(&self) -> bool;

    /// State after the last applied block.
    fn chain_state(&self) -> ChainState;
}
