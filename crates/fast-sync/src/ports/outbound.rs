//! Outbound ports (SPI) for the fast-sync engine.

use crate::domain::{ChainState, ExecutionError, PeerFault, SyncMessage, TransportError};
use shared_types::{Block, BlockId, PeerId, PublicKey, Signature};

/// Typed messaging to identified peers.
pub trait Transport: Send + Sync {
    /// Send one message to one peer.
    fn send(&self, peer: PeerId, message: &SyncMessage) -> Result<(), TransportError>;

    /// Send one message to every connected peer. Best effort.
    fn broadcast(&self, message: &SyncMessage);

    /// Flag a peer as unreliable or misbehaving. The transport decides
    /// whether to disconnect it.
    fn report_peer(&self, peer: PeerId, fault: &PeerFault);
}

/// Events the transport feeds into the reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer joined.
    PeerConnected(PeerId),
    /// A peer left.
    PeerDisconnected(PeerId),
    /// Raw bytes received on the sync channel.
    Message {
        /// Sender
        peer: PeerId,
        /// Encoded [`SyncMessage`]
        payload: Vec<u8>,
    },
    /// A previously queued send to this peer failed.
    SendFailed {
        /// Target of the failed send
        peer: PeerId,
    },
}

/// Deterministic state-transition function.
pub trait BlockExecutor: Send + Sync {
    /// Apply a verified block on top of `state`.
    fn apply(
        &self,
        state: &ChainState,
        block_id: BlockId,
        block: &Block,
    ) -> Result<ChainState, ExecutionError>;
}

/// Receiver of the one-time hand-off.
pub trait ConsensusHandoff: Send + Sync {
    /// Start live consensus from `state`.
    fn switch_to_consensus(&self, state: ChainState, blocks_synced: u64);
}

/// Signature check over validator precommits.
pub trait SignatureVerifier: Send + Sync {
    /// True if `signature` is valid for `message` under `pub_key`.
    fn verify(&self, pub_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;
}
