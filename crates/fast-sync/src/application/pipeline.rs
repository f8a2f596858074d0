//! # Verify-Apply Pipeline
//!
//! Single consumer of the pool's buffer. Each block is verified against the
//! current chain state and its finalizing commit, executed, then persisted
//! together with that commit. Nothing is applied or stored out of order.
//!
//! Verification and execution run without the pool lock; the lock is taken
//! only to read the next block and to record the outcome.

use crate::domain::{
    verify_block, Blame, BlockPool, ChainState, PeerFault, ReadyBlock, SyncError,
};
use crate::metrics;
use crate::ports::outbound::{BlockExecutor, SignatureVerifier};
use block_store::BlockStore;
use parking_lot::Mutex;
use shared_types::{BlockId, PeerId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const PROGRESS_LOG_EVERY: u64 = 100;

/// Result of one drain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Blocks applied and stored.
    pub applied: u64,
    /// Peers evicted for supplying an invalid block or commit.
    pub rejected: Vec<(PeerId, PeerFault)>,
}

/// Verifies, executes and stores buffered blocks in height order.
pub struct VerifyApplyPipeline {
    state: ChainState,
    store: Arc<dyn BlockStore>,
    executor: Arc<dyn BlockExecutor>,
    verifier: Arc<dyn SignatureVerifier>,
    blocks_synced: u64,
    halted: bool,
}

impl VerifyApplyPipeline {
    /// Pipeline continuing from `state`.
    pub fn new(
        state: ChainState,
        store: Arc<dyn BlockStore>,
        executor: Arc<dyn BlockExecutor>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            state,
            store,
            executor,
            verifier,
            blocks_synced: 0,
            halted: false,
        }
    }

    /// State after the last applied block.
    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Blocks applied by this pipeline.
    pub fn blocks_synced(&self) -> u64 {
        self.blocks_synced
    }

    /// True after a fatal error.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Apply up to `max` ready blocks.
    ///
    /// Stops early at the first block that is not ready or fails
    /// verification. Executor and storage failures halt the pipeline.
    pub fn drain(&mut self, pool: &Mutex<BlockPool>, max: usize) -> Result<DrainReport, SyncError> {
        if self.halted {
            return Err(SyncError::Halted);
        }

        let mut report = DrainReport::default();
        for _ in 0..max {
            let Some(ready) = pool.lock().next_ready() else {
                break;
            };

            match verify_block(&self.state, &ready.block, &ready.commit, self.verifier.as_ref()) {
                Ok(block_id) => {
                    self.apply(ready, block_id, pool)?;
                    report.applied += 1;
                }
                Err(failure) => {
                    let offenders = match failure.blame {
                        Blame::BlockSupplier => vec![ready.block_peer],
                        Blame::CommitSupplier => vec![ready.commit_peer],
                        Blame::Both => vec![ready.block_peer, ready.commit_peer],
                    };
                    warn!(
                        height = ready.height,
                        block_peer = %ready.block_peer,
                        commit_peer = %ready.commit_peer,
                        blame = ?failure.blame,
                        reason = %failure.error,
                        "[fast-sync] Block failed verification"
                    );
                    let fault = PeerFault::InvalidBlock(failure.error);
                    let removed = pool.lock().reject(ready.height, &offenders);
                    report
                        .rejected
                        .extend(removed.into_iter().map(|peer| (peer, fault.clone())));
                    break;
                }
            }
        }
        Ok(report)
    }

    fn apply(
        &mut self,
        ready: ReadyBlock,
        block_id: BlockId,
        pool: &Mutex<BlockPool>,
    ) -> Result<(), SyncError> {
        let height = ready.height;

        let next = match self.executor.apply(&self.state, block_id, &ready.block) {
            Ok(next) => next,
            Err(source) => {
                self.halted = true;
                error!(height, error = %source, "[fast-sync] Executor rejected verified block");
                return Err(SyncError::StateApplication { height, source });
            }
        };

        if let Err(e) = self.store.save_block(&ready.block, &ready.commit) {
            self.halted = true;
            error!(height, error = %e, "[fast-sync] Failed to store block");
            return Err(SyncError::Storage(e));
        }

        self.state = next;
        self.blocks_synced += 1;
        pool.lock().mark_applied(height);
        metrics::record_block_applied();

        if height % PROGRESS_LOG_EVERY == 0 {
            info!(height, blocks_synced = self.blocks_synced, "[fast-sync] Sync progress");
        } else {
            debug!(height, peer = %ready.block_peer, "[fast-sync] Block applied");
        }
        Ok(())
    }
}
