//! # Domain Errors
//!
//! Error types for fast sync.
//!
//! Peer faults are recovered locally by evicting the peer. Only
//! [`SyncError`] is surfaced to the caller, and only for conditions that
//! stop the engine.

use block_store::StorageError;
use shared_types::PeerId;
use thiserror::Error;

/// Why a block or commit failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Header height differs from the height being applied.
    #[error("Height mismatch: expected {expected}, got {got}")]
    HeightMismatch {
        /// Height being applied
        expected: u64,
        /// Height in the header
        got: u64,
    },

    /// Header belongs to another chain.
    #[error("Chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch {
        /// Local chain id
        expected: String,
        /// Chain id in the header
        got: String,
    },

    /// `last_block_id` does not point at the stored previous block.
    #[error("Broken linkage at height {height}: previous block id does not match")]
    LinkageMismatch {
        /// Height of the offending block
        height: u64,
    },

    /// Transactions do not hash to `data_hash`.
    #[error("Data hash mismatch at height {height}")]
    DataHashMismatch {
        /// Height of the offending block
        height: u64,
    },

    /// Header names a validator set other than the active one.
    #[error("Validators hash mismatch at height {height}")]
    ValidatorsHashMismatch {
        /// Height of the offending block
        height: u64,
    },

    /// Header carries an app hash other than the local state's.
    #[error("App hash mismatch at height {height}")]
    AppHashMismatch {
        /// Height of the offending block
        height: u64,
    },

    /// Commit is bound to the wrong height.
    #[error("Commit is for height {got}, expected {expected}")]
    CommitHeightMismatch {
        /// Height the commit should finalize
        expected: u64,
        /// Height named by the commit
        got: u64,
    },

    /// Commit is internally valid but finalizes a different block.
    #[error("Commit at height {height} finalizes a different block")]
    CommitBlockMismatch {
        /// Height of the block
        height: u64,
    },

    /// Signature from an address outside the validator set.
    #[error("Unknown validator {address}")]
    UnknownValidator {
        /// Hex-encoded address
        address: String,
    },

    /// Validator signed the same commit twice.
    #[error("Duplicate signature from validator {address}")]
    DuplicateSignature {
        /// Hex-encoded address
        address: String,
    },

    /// Signature does not verify over the vote sign-bytes.
    #[error("Invalid signature from validator {address}")]
    InvalidSignature {
        /// Hex-encoded address
        address: String,
    },

    /// Signed power is not more than two thirds of the total.
    #[error("Insufficient voting power: {signed} of {total}")]
    InsufficientVotingPower {
        /// Power that signed
        signed: u64,
        /// Total power of the set
        total: u64,
    },

    /// A `BlockResponse` whose commit is not bound by the block header.
    #[error("Last commit hash mismatch at height {height}")]
    LastCommitHashMismatch {
        /// Height of the offending block
        height: u64,
    },
}

/// Reason a peer is evicted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerFault {
    /// Too many consecutive request timeouts.
    #[error("timed out on {consecutive} consecutive requests")]
    Timeout {
        /// Consecutive timeouts at eviction
        consecutive: u32,
    },

    /// Peer answered a request with `NoBlockResponse`.
    #[error("no block at requested height {height}")]
    NoBlock {
        /// Requested height
        height: u64,
    },

    /// The transport could not deliver to the peer.
    #[error("send failed")]
    SendFailed,

    /// Undecodable, oversized or structurally invalid message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Peer announced a height below what it already delivered.
    #[error("height regression: claimed {claimed} after delivering {delivered}")]
    HeightRegression {
        /// Newly claimed height
        claimed: u64,
        /// Highest height delivered by the peer
        delivered: u64,
    },

    /// Peer supplied a block or commit that failed verification.
    #[error("invalid block: {0}")]
    InvalidBlock(VerificationError),
}

impl PeerFault {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            PeerFault::Timeout { .. } => "timeout",
            PeerFault::NoBlock { .. } => "no_block",
            PeerFault::SendFailed => "send_failed",
            PeerFault::Malformed(_) => "malformed",
            PeerFault::HeightRegression { .. } => "height_regression",
            PeerFault::InvalidBlock(_) => "invalid_block",
        }
    }

    /// True for protocol violations, false for transient failures.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            PeerFault::Malformed(_) | PeerFault::HeightRegression { .. } | PeerFault::InvalidBlock(_)
        )
    }
}

/// Failure of the state-transition function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Block was built for another validator set.
    #[error("Validators hash mismatch at height {height}")]
    ValidatorsHashMismatch {
        /// Height of the block
        height: u64,
    },

    /// Block was built on another application state.
    #[error("App hash mismatch at height {height}")]
    AppHashMismatch {
        /// Height of the block
        height: u64,
    },

    /// Block does not follow the state's last height.
    #[error("Unexpected height {got}, state is at {state_height}")]
    UnexpectedHeight {
        /// Height of the state
        state_height: u64,
        /// Height of the block
        got: u64,
    },

    /// Any other rejection by the application.
    #[error("Application rejected block: {0}")]
    Rejected(String),
}

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No connection to the peer.
    #[error("Peer {0} is not connected")]
    PeerNotConnected(PeerId),

    /// The peer's inbox is gone.
    #[error("Channel to peer {0} is closed")]
    ChannelClosed(PeerId),

    /// Message could not be encoded.
    #[error("Encoding failed: {0}")]
    Codec(#[from] CodecError),
}

/// Wire codec failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Bytes do not decode to a message.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Message could not be encoded.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Message exceeds the size limit.
    #[error("Message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Message size
        size: usize,
        /// Limit
        max: usize,
    },
}

/// Errors that stop the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Executor rejected a verified block.
    #[error("State application failed at height {height}: {source}")]
    StateApplication {
        /// Height of the block
        height: u64,
        /// Executor error
        #[source]
        source: ExecutionError,
    },

    /// Block store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Initial state does not match the store.
    #[error("State at height {state_height} does not match store at height {store_height}")]
    StateMismatch {
        /// Height of the chain state
        state_height: u64,
        /// Height of the store
        store_height: u64,
    },

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A previous fatal error stopped the engine.
    #[error("Sync engine halted")]
    Halted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        assert!(!PeerFault::Timeout { consecutive: 3 }.is_violation());
        assert!(!PeerFault::NoBlock { height: 4 }.is_violation());
        assert!(!PeerFault::SendFailed.is_violation());
        assert!(PeerFault::Malformed("x".into()).is_violation());
        assert!(PeerFault::InvalidBlock(VerificationError::LinkageMismatch { height: 2 })
            .is_violation());
    }

    #[test]
    fn test_fault_display_carries_reason() {
        let fault = PeerFault::HeightRegression {
            claimed: 3,
            delivered: 9,
        };
        assert_eq!(fault.to_string(), "height regression: claimed 3 after delivering 9");
        assert_eq!(fault.label(), "height_regression");
    }

    #[test]
    fn test_state_application_error() {
        let err = SyncError::StateApplication {
            height: 42,
            source: ExecutionError::AppHashMismatch { height: 42 },
        };
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_insufficient_power_message() {
        let err = VerificationError::InsufficientVotingPower {
            signed: 2,
            total: 3,
        };
        assert!(err.to_string().contains("2 of 3"));
    }
}
