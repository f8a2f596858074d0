//! # Deterministic Executor
//!
//! Stand-in application used by tests and the in-process network. It has
//! no transaction semantics: the app hash simply folds in the hash of every
//! transaction, so two nodes applying the same blocks agree byte-for-byte.

use crate::domain::{ChainState, ExecutionError};
use crate::ports::outbound::BlockExecutor;
use shared_crypto::{sha256, Sha256Hasher};
use shared_types::{Block, BlockId, Hash};

/// Hash-folding [`BlockExecutor`].
#[derive(Debug, Clone, Default)]
pub struct DeterministicExecutor {
    reject_at: Option<u64>,
}

impl DeterministicExecutor {
    /// Executor accepting every well-formed block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that rejects the block at `height`.
    pub fn rejecting_at(height: u64) -> Self {
        Self {
            reject_at: Some(height),
        }
    }

    /// App hash after applying `txs` on top of `app_hash`.
    pub fn next_app_hash(app_hash: &Hash, txs: &[Vec<u8>]) -> Hash {
        let mut hasher = Sha256Hasher::new();
        hasher.update(app_hash);
        for tx in txs {
            hasher.update(&sha256(tx));
        }
        hasher.finalize()
    }
}

impl BlockExecutor for DeterministicExecutor {
    fn apply(
        &self,
        state: &ChainState,
        block_id: BlockId,
        block: &Block,
    ) -> Result<ChainState, ExecutionError> {
        let header = &block.header;
        if header.height != state.last_block_height + 1 {
            return Err(ExecutionError::UnexpectedHeight {
                state_height: state.last_block_height,
                got: header.height,
            });
        }
        if header.validators_hash != state.validators.hash() {
            return Err(ExecutionError::ValidatorsHashMismatch {
                height: header.height,
            });
        }
        if header.app_hash != state.app_hash {
            return Err(ExecutionError::AppHashMismatch {
                height: header.height,
            });
        }
        if self.reject_at == Some(header.height) {
            return Err(ExecutionError::Rejected(format!(
                "configured to reject height {}",
                header.height
            )));
        }

        Ok(ChainState {
            chain_id: state.chain_id.clone(),
            last_block_height: header.height,
            last_block_id: block_id,
            last_block_time: header.time,
            validators: state.validators.clone(),
            app_hash: Self::next_app_hash(&state.app_hash, &block.txs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ChainBuilder;

    #[test]
    fn test_replays_builder_chain() {
        let chain = ChainBuilder::new("exec").txs_per_block(3).build(4);
        let executor = DeterministicExecutor::new();
        let mut state = chain.genesis_state();
        for h in 1..=4 {
            let block = chain.block(h);
            state = executor.apply(&state, block.block_id(), block).unwrap();
        }
        assert_eq!(state, chain.final_state);
    }

    #[test]
    fn test_rejects_out_of_order_block() {
        let chain = ChainBuilder::new("exec").build(2);
        let err = DeterministicExecutor::new()
            .apply(&chain.genesis_state(), chain.block(2).block_id(), chain.block(2))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::UnexpectedHeight {
                state_height: 0,
                got: 2
            }
        );
    }

    #[test]
    fn test_rejects_foreign_app_hash() {
        let other = ChainBuilder::new("exec").genesis_time(1).build(1);
        let chain = ChainBuilder::new("exec").build(1);
        let err = DeterministicExecutor::new()
            .apply(&chain.genesis_state(), other.block(1).block_id(), other.block(1))
            .unwrap_err();
        assert_eq!(err, ExecutionError::AppHashMismatch { height: 1 });
    }

    #[test]
    fn test_configured_rejection() {
        let chain = ChainBuilder::new("exec").build(1);
        let err = DeterministicExecutor::rejecting_at(1)
            .apply(&chain.genesis_state(), chain.block(1).block_id(), chain.block(1))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(_)));
    }

    #[test]
    fn test_app_hash_depends_on_txs() {
        let base = [1u8; 32];
        assert_ne!(
            DeterministicExecutor::next_app_hash(&base, &[b"a".to_vec()]),
            DeterministicExecutor::next_app_hash(&base, &[b"b".to_vec()])
        );
        assert_ne!(DeterministicExecutor::next_app_hash(&base, &[]), base);
    }
}
