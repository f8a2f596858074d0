//! # Block Verification
//!
//! Checks run before a block is applied: structural linkage against the
//! local chain state, then commit sufficiency.
//!
//! Failures carry a [`Blame`] so the pipeline knows which supplier to
//! evict. The block at `h` and its finalizing commit usually come from
//! different peers.

use crate::domain::errors::VerificationError;
use crate::domain::state::ChainState;
use crate::ports::outbound::SignatureVerifier;
use shared_types::{vote_sign_bytes, Block, BlockId, Commit, ValidatorSet};
use std::collections::HashSet;

/// Which supplier a verification failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blame {
    /// The peer that supplied the block.
    BlockSupplier,
    /// The peer that supplied the commit.
    CommitSupplier,
    /// Both: each side is consistent on its own but they disagree.
    Both,
}

/// A failed check and who is responsible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    /// What failed.
    pub error: VerificationError,
    /// Who to evict.
    pub blame: Blame,
}

impl VerificationFailure {
    fn new(error: VerificationError, blame: Blame) -> Self {
        Self { error, blame }
    }
}

/// Check that `block` is the next block on top of `state`.
pub fn verify_linkage(state: &ChainState, block: &Block) -> Result<(), VerificationError> {
    let header = &block.header;
    let expected = state.last_block_height + 1;

    if header.height != expected {
        return Err(VerificationError::HeightMismatch {
            expected,
            got: header.height,
        });
    }
    if header.chain_id != state.chain_id {
        return Err(VerificationError::ChainIdMismatch {
            expected: state.chain_id.clone(),
            got: header.chain_id.clone(),
        });
    }
    if header.last_block_id != state.last_block_id {
        return Err(VerificationError::LinkageMismatch {
            height: header.height,
        });
    }
    if header.data_hash != Block::compute_data_hash(&block.txs) {
        return Err(VerificationError::DataHashMismatch {
            height: header.height,
        });
    }
    if header.validators_hash != state.validators.hash() {
        return Err(VerificationError::ValidatorsHashMismatch {
            height: header.height,
        });
    }
    if header.app_hash != state.app_hash {
        return Err(VerificationError::AppHashMismatch {
            height: header.height,
        });
    }
    Ok(())
}

/// Verify the signatures of `commit` against `validators` and return the
/// voting power that signed. Absent votes are skipped.
pub fn tally_commit(
    chain_id: &str,
    validators: &ValidatorSet,
    commit: &Commit,
    verifier: &dyn SignatureVerifier,
) -> Result<u64, VerificationError> {
    let mut seen = HashSet::with_capacity(commit.signatures.len());
    let mut signed: u64 = 0;

    for sig in &commit.signatures {
        let Some(signature) = &sig.signature else {
            continue;
        };
        let address = hex::encode(sig.validator_address);

        let validator = validators
            .get_by_address(&sig.validator_address)
            .ok_or_else(|| VerificationError::UnknownValidator {
                address: address.clone(),
            })?;

        if !seen.insert(sig.validator_address) {
            return Err(VerificationError::DuplicateSignature { address });
        }

        let message = vote_sign_bytes(
            chain_id,
            commit.height,
            commit.round,
            &commit.block_id,
            sig.timestamp,
        );
        if !verifier.verify(&validator.pub_key, &message, signature) {
            return Err(VerificationError::InvalidSignature { address });
        }

        signed = signed.saturating_add(validator.voting_power);
    }

    Ok(signed)
}

/// Full commit check for the block with id `block_id` at `height`.
pub fn verify_commit(
    chain_id: &str,
    validators: &ValidatorSet,
    height: u64,
    block_id: &BlockId,
    commit: &Commit,
    verifier: &dyn SignatureVerifier,
) -> Result<(), VerificationError> {
    check_commit_internally(chain_id, validators, height, commit, verifier)?;
    if commit.block_id != *block_id {
        return Err(VerificationError::CommitBlockMismatch { height });
    }
    Ok(())
}

fn check_commit_internally(
    chain_id: &str,
    validators: &ValidatorSet,
    height: u64,
    commit: &Commit,
    verifier: &dyn SignatureVerifier,
) -> Result<(), VerificationError> {
    if commit.height != height {
        return Err(VerificationError::CommitHeightMismatch {
            expected: height,
            got: commit.height,
        });
    }

    let signed = tally_commit(chain_id, validators, commit, verifier)?;
    let total = validators.total_voting_power();
    if u128::from(signed) * 3 <= u128::from(total) * 2 {
        return Err(VerificationError::InsufficientVotingPower { signed, total });
    }
    Ok(())
}

/// Verify `block` on top of `state` with its finalizing `commit`.
///
/// Returns the block id on success.
pub fn verify_block(
    state: &ChainState,
    block: &Block,
    commit: &Commit,
    verifier: &dyn SignatureVerifier,
) -> Result<BlockId, VerificationFailure> {
    verify_linkage(state, block)
        .map_err(|e| VerificationFailure::new(e, Blame::BlockSupplier))?;

    let height = block.height();
    check_commit_internally(&state.chain_id, &state.validators, height, commit, verifier)
        .map_err(|e| VerificationFailure::new(e, Blame::CommitSupplier))?;

    let block_id = block.block_id();
    if commit.block_id != block_id {
        return Err(VerificationFailure::new(
            VerificationError::CommitBlockMismatch { height },
            Blame::Both,
        ));
    }
    Ok(block_id)
}
