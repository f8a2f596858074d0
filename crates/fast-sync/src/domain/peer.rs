//! # Peer Lifecycle
//!
//! Per-peer record kept by the pool.
//!
//! ```text
//! Unknown ──status──→ StatusKnown ──request──→ Requesting{h} ⇄ Idle
//!    │                     │                        │           │
//!    └─────────────────────┴───────── remove ───────┴───────────┴──→ Removed
//! ```
//!
//! `Requesting` is the only phase with an outstanding request, which gives
//! the single-request-per-peer policy structurally.

use shared_types::PeerId;
use std::fmt;
use std::time::Instant;

/// Lifecycle phase of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// Connected, height not yet announced.
    Unknown,
    /// Height announced, never asked for a block.
    StatusKnown,
    /// No request outstanding.
    Idle,
    /// One request outstanding.
    Requesting {
        /// Requested height
        height: u64,
        /// When the request was issued
        sent_at: Instant,
    },
    /// Evicted or disconnected.
    Removed,
}

impl PeerPhase {
    fn name(&self) -> &'static str {
        match self {
            PeerPhase::Unknown => "unknown",
            PeerPhase::StatusKnown => "status_known",
            PeerPhase::Idle => "idle",
            PeerPhase::Requesting { .. } => "requesting",
            PeerPhase::Removed => "removed",
        }
    }
}

impl fmt::Display for PeerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rejected phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    /// Phase the peer was in.
    pub from: PeerPhase,
    /// Requested transition.
    pub action: &'static str,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot {} from phase {}", self.action, self.from)
    }
}

impl std::error::Error for IllegalTransition {}

/// What the pool knows about one peer.
#[derive(Debug, Clone)]
pub struct PeerState {
    /// Peer id.
    pub id: PeerId,
    /// Highest height the peer claims.
    pub height: u64,
    /// Lifecycle phase.
    pub phase: PeerPhase,
    /// When the last request was issued.
    pub last_request_time: Option<Instant>,
    /// When the last block arrived.
    pub last_response_time: Option<Instant>,
    /// Requests issued.
    pub requests_sent: u64,
    /// Blocks delivered in answer to a request.
    pub blocks_received: u64,
    /// Requests that timed out.
    pub timeouts: u64,
    /// Timeouts since the last successful delivery.
    pub consecutive_timeouts: u32,
    /// Highest height delivered.
    pub delivered_height: u64,
    /// Set by a timeout, cleared by a delivery.
    pub suspect: bool,
}

impl PeerState {
    /// Newly connected peer.
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            height: 0,
            phase: PeerPhase::Unknown,
            last_request_time: None,
            last_response_time: None,
            requests_sent: 0,
            blocks_received: 0,
            timeouts: 0,
            consecutive_timeouts: 0,
            delivered_height: 0,
            suspect: false,
        }
    }

    /// True once the peer has announced a height.
    pub fn has_status(&self) -> bool {
        !matches!(self.phase, PeerPhase::Unknown | PeerPhase::Removed)
    }

    /// True when a request may be assigned.
    pub fn is_available(&self) -> bool {
        matches!(self.phase, PeerPhase::StatusKnown | PeerPhase::Idle)
    }

    /// Height of the outstanding request.
    pub fn pending_height(&self) -> Option<u64> {
        match self.phase {
            PeerPhase::Requesting { height, .. } => Some(height),
            _ => None,
        }
    }

    /// Record a height announcement. `Unknown` becomes `StatusKnown`.
    pub fn observe_status(&mut self, height: u64) -> Result<(), IllegalTransition> {
        match self.phase {
            PeerPhase::Removed => Err(self.illegal("observe status")),
            PeerPhase::Unknown => {
                self.phase = PeerPhase::StatusKnown;
                self.height = height;
                Ok(())
            }
            _ => {
                self.height = self.height.max(height);
                Ok(())
            }
        }
    }

    /// Issue a request for `height`.
    pub fn begin_request(&mut self, height: u64, now: Instant) -> Result<(), IllegalTransition> {
        if !self.is_available() {
            return Err(self.illegal("begin request"));
        }
        self.phase = PeerPhase::Requesting {
            height,
            sent_at: now,
        };
        self.last_request_time = Some(now);
        self.requests_sent += 1;
        Ok(())
    }

    /// The outstanding request for `height` was answered with a block.
    pub fn complete_request(&mut self, height: u64, now: Instant) -> Result<(), IllegalTransition> {
        if self.pending_height() != Some(height) {
            return Err(self.illegal("complete request"));
        }
        self.phase = PeerPhase::Idle;
        self.last_response_time = Some(now);
        self.blocks_received += 1;
        self.consecutive_timeouts = 0;
        self.delivered_height = self.delivered_height.max(height);
        self.suspect = false;
        Ok(())
    }

    /// The outstanding request was cancelled without a block.
    pub fn abandon_request(&mut self) -> Result<(), IllegalTransition> {
        if self.pending_height().is_none() {
            return Err(self.illegal("abandon request"));
        }
        self.phase = PeerPhase::Idle;
        Ok(())
    }

    /// The outstanding request timed out. Returns the consecutive count.
    pub fn time_out(&mut self) -> Result<u32, IllegalTransition> {
        self.abandon_request()?;
        self.timeouts += 1;
        self.consecutive_timeouts += 1;
        self.suspect = true;
        Ok(self.consecutive_timeouts)
    }

    /// Terminal phase.
    pub fn remove(&mut self) {
        self.phase = PeerPhase::Removed;
    }

    fn illegal(&self, action: &'static str) -> IllegalTransition {
        IllegalTransition {
            from: self.phase,
            action,
        }
    }
}
