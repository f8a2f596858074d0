//! Peer-to-peer sync messages.

use serde::{Deserialize, Serialize};
use shared_types::{Block, Commit};

/// Messages exchanged on the sync channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Ask a peer for its height.
    StatusRequest,

    /// Announce own store height.
    StatusResponse {
        /// Highest stored height
        height: u64,
    },

    /// Ask for the block at `height`.
    BlockRequest {
        /// Requested height
        height: u64,
    },

    /// A block with the commit finalizing its predecessor.
    BlockResponse {
        /// The block
        block: Block,
        /// Commit for `block.height - 1`, empty at height 1
        commit: Commit,
        /// Commit for `block.height`, sent when the block is the
        /// responder's tip
        tip_commit: Option<Commit>,
    },

    /// The peer does not hold `height`.
    NoBlockResponse {
        /// Requested height
        height: u64,
    },
}

impl SyncMessage {
    /// Message name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::StatusRequest => "status_request",
            SyncMessage::StatusResponse { .. } => "status_response",
            SyncMessage::BlockRequest { .. } => "block_request",
            SyncMessage::BlockResponse { .. } => "block_response",
            SyncMessage::NoBlockResponse { .. } => "no_block_response",
        }
    }
}
