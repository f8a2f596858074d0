//! # Block Pool
//!
//! Single owned aggregate holding the peer registry, the pending-request
//! index and the block buffer. Every operation takes `now` explicitly; the
//! pool never reads the clock, so tests drive time by hand.
//!
//! ## Invariants
//!
//! - At most one pending request per height (`pending` is keyed by height).
//! - A peer in `Requesting{h}` has exactly the pending entry `h → peer`.
//! - Buffered blocks are released only at `height`, in ascending order.
//! - `max_peer_height` is the max over peers currently known.
//! - A peer evicted for a protocol violation is not re-registered until
//!   its connection drops.

use crate::config::FastSyncConfig;
use crate::domain::errors::PeerFault;
use crate::domain::peer::PeerState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use shared_types::{Block, Commit, PeerId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Subset of [`FastSyncConfig`] the pool uses.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Request window size.
    pub buffer_capacity: u64,
    /// Time a peer has to answer.
    pub request_timeout: Duration,
    /// Consecutive timeouts before removal.
    pub max_consecutive_timeouts: u32,
    /// Starvation warning period.
    pub starvation_threshold: Duration,
    /// Quiet period before declaring caught up.
    pub quiescence_window: Duration,
    /// Tie-break seed.
    pub rng_seed: Option<u64>,
}

impl From<&FastSyncConfig> for PoolConfig {
    fn from(config: &FastSyncConfig) -> Self {
        Self {
            buffer_capacity: config.buffer_capacity.max(1),
            request_timeout: config.request_timeout(),
            max_consecutive_timeouts: config.max_consecutive_timeouts.max(1),
            starvation_threshold: config.starvation_threshold(),
            quiescence_window: config.quiescence_window(),
            rng_seed: config.rng_seed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    peer: PeerId,
    sent_at: Instant,
}

/// A received block waiting for its turn.
#[derive(Debug, Clone)]
pub struct BufferedBlock {
    /// The block.
    pub block: Block,
    /// Commit for the previous height, as carried by the response.
    pub commit: Commit,
    /// Commit for this height, when the supplier served its tip.
    pub tip_commit: Option<Commit>,
    /// Supplier.
    pub peer: PeerId,
}

/// The block at the apply point together with its finalizing commit.
#[derive(Debug, Clone)]
pub struct ReadyBlock {
    /// Height to apply.
    pub height: u64,
    /// The block.
    pub block: Block,
    /// Supplier of the block.
    pub block_peer: PeerId,
    /// Commit finalizing the block.
    pub commit: Commit,
    /// Supplier of the commit.
    pub commit_peer: PeerId,
}

/// A block request the transport should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestIntent {
    /// Target peer.
    pub peer: PeerId,
    /// Requested height.
    pub height: u64,
}

/// Result of one scheduling pass.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Requests to send, in ascending height order.
    pub requests: Vec<RequestIntent>,
    /// `(peer, height)` of requests cancelled by timeout.
    pub timed_out: Vec<(PeerId, u64)>,
    /// Peers removed for repeated timeouts.
    pub evicted: Vec<(PeerId, PeerFault)>,
    /// Set when the front of the window has had no eligible peer for a
    /// full starvation period.
    pub starving: Option<u64>,
}

/// What happened to a delivered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverOutcome {
    /// Buffered.
    Accepted,
    /// Height already applied.
    AlreadyApplied,
    /// Height already buffered from the assigned peer.
    Duplicate,
    /// No matching pending request from this peer.
    Unsolicited,
}

/// Progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Next height to apply.
    pub height: u64,
    /// Highest height claimed by a known peer.
    pub max_peer_height: u64,
    /// Registered peers.
    pub peers: usize,
    /// Outstanding requests.
    pub pending: usize,
    /// Buffered blocks.
    pub buffered: usize,
}

/// Peer registry, pending requests and block buffer.
pub struct BlockPool {
    config: PoolConfig,
    peers: HashMap<PeerId, PeerState>,
    pending: BTreeMap<u64, PendingRequest>,
    buffer: BTreeMap<u64, BufferedBlock>,
    last_timeout_peer: HashMap<u64, PeerId>,
    banned: HashSet<PeerId>,
    height: u64,
    max_peer_height: u64,
    rng: StdRng,
    starving_since: Option<Instant>,
    last_starvation_warning: Option<Instant>,
    last_busy: Instant,
    caught_up_emitted: bool,
}

impl BlockPool {
    /// Pool that starts acquiring at `start_height`.
    pub fn new(start_height: u64, config: PoolConfig, now: Instant) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            peers: HashMap::new(),
            pending: BTreeMap::new(),
            buffer: BTreeMap::new(),
            last_timeout_peer: HashMap::new(),
            banned: HashSet::new(),
            height: start_height.max(1),
            max_peer_height: 0,
            rng,
            starving_since: None,
            last_starvation_warning: None,
            last_busy: now,
            caught_up_emitted: false,
        }
    }

    // =========================================================================
    // Peer registry
    // =========================================================================

    /// Register a connected peer. Returns false if already known or banned.
    pub fn add_peer(&mut self, peer: PeerId) -> bool {
        if self.peers.contains_key(&peer) || self.banned.contains(&peer) {
            return false;
        }
        self.peers.insert(peer, PeerState::new(peer));
        true
    }

    /// Record a height announcement, registering unknown peers.
    ///
    /// A lower claim is ignored unless it falls below what the peer has
    /// already delivered, which is a protocol violation. Announcements from
    /// banned peers are dropped.
    pub fn set_peer_height(
        &mut self,
        peer: PeerId,
        height: u64,
        now: Instant,
    ) -> Result<(), PeerFault> {
        if self.banned.contains(&peer) {
            debug!(%peer, height, "[fast-sync] Ignoring status from banned peer");
            return Ok(());
        }

        let state = self
            .peers
            .entry(peer)
            .or_insert_with(|| PeerState::new(peer));

        if state.has_status() && height < state.height {
            if height < state.delivered_height {
                return Err(PeerFault::HeightRegression {
                    claimed: height,
                    delivered: state.delivered_height,
                });
            }
            debug!(%peer, claimed = height, known = state.height, "[fast-sync] Ignoring lower height claim");
            return Ok(());
        }

        if state.observe_status(height).is_err() {
            return Ok(());
        }

        if height > self.max_peer_height {
            self.max_peer_height = height;
            self.last_busy = now;
        }
        Ok(())
    }

    /// Remove a peer: cancel its request, drop the blocks it supplied that
    /// are not yet applied, recompute `max_peer_height`. Idempotent.
    pub fn remove_peer(&mut self, peer: &PeerId) -> Option<PeerState> {
        let mut state = self.peers.remove(peer)?;

        if let Some(height) = state.pending_height() {
            if self.pending.get(&height).is_some_and(|r| r.peer == *peer) {
                self.pending.remove(&height);
            }
        }

        let before = self.buffer.len();
        self.buffer.retain(|_, b| b.peer != *peer);
        let dropped = before - self.buffer.len();

        self.recompute_max_peer_height();
        state.remove();

        debug!(
            %peer,
            dropped_blocks = dropped,
            max_peer_height = self.max_peer_height,
            "[fast-sync] Peer removed from pool"
        );
        Some(state)
    }

    /// Remove a peer for `fault`. Protocol violations also ban it until
    /// [`peer_disconnected`](Self::peer_disconnected).
    pub fn evict_peer(&mut self, peer: &PeerId, fault: &PeerFault) -> Option<PeerState> {
        if fault.is_violation() {
            self.banned.insert(*peer);
        }
        self.remove_peer(peer)
    }

    /// The peer's connection is gone: remove it and lift any ban, so a
    /// fresh connection starts clean.
    pub fn peer_disconnected(&mut self, peer: &PeerId) -> Option<PeerState> {
        self.banned.remove(peer);
        self.remove_peer(peer)
    }

    /// Whether status from `peer` is being ignored.
    pub fn is_banned(&self, peer: &PeerId) -> bool {
        self.banned.contains(peer)
    }

    fn recompute_max_peer_height(&mut self) {
        self.max_peer_height = self
            .peers
            .values()
            .filter(|p| p.has_status())
            .map(|p| p.height)
            .max()
            .unwrap_or(0);
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Expire stale requests, then assign every unassigned height in the
    /// window to an eligible peer.
    pub fn schedule(&mut self, now: Instant) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();
        self.expire_requests(now, &mut outcome);
        self.assign_requests(now, &mut outcome);
        if !self.pending.is_empty() {
            self.last_busy = now;
        }
        outcome
    }

    fn expire_requests(&mut self, now: Instant, outcome: &mut ScheduleOutcome) {
        let timeout = self.config.request_timeout;
        let expired: Vec<(u64, PeerId)> = self
            .pending
            .iter()
            .filter(|(_, r)| now.saturating_duration_since(r.sent_at) >= timeout)
            .map(|(h, r)| (*h, r.peer))
            .collect();

        for (height, peer) in expired {
            self.pending.remove(&height);
            self.last_timeout_peer.insert(height, peer);
            self.last_busy = now;
            outcome.timed_out.push((peer, height));

            let Some(state) = self.peers.get_mut(&peer) else {
                continue;
            };
            let consecutive = state.time_out().unwrap_or(state.consecutive_timeouts);
            warn!(%peer, height, consecutive, "[fast-sync] Block request timed out");

            if consecutive >= self.config.max_consecutive_timeouts {
                self.remove_peer(&peer);
                outcome
                    .evicted
                    .push((peer, PeerFault::Timeout { consecutive }));
            }
        }
    }

    fn assign_requests(&mut self, now: Instant, outcome: &mut ScheduleOutcome) {
        if self.max_peer_height < self.height {
            self.track_starvation(None, now, outcome);
            return;
        }

        let last = self
            .max_peer_height
            .min(self.height.saturating_add(self.config.buffer_capacity - 1));
        let mut first_unassigned = None;

        for height in self.height..=last {
            if self.buffer.contains_key(&height) || self.pending.contains_key(&height) {
                continue;
            }
            let assigned = match self.pick_peer(height) {
                Some(peer) => self.assign(peer, height, now),
                None => false,
            };
            if assigned {
                outcome.requests.push(RequestIntent {
                    peer: self.pending[&height].peer,
                    height,
                });
            } else if first_unassigned.is_none() {
                first_unassigned = Some(height);
            }
        }

        // Only the two heights the pipeline needs next count as starving.
        let front = first_unassigned.filter(|h| *h <= self.height + 1);
        self.track_starvation(front, now, outcome);
    }

    fn assign(&mut self, peer: PeerId, height: u64, now: Instant) -> bool {
        let Some(state) = self.peers.get_mut(&peer) else {
            return false;
        };
        if state.begin_request(height, now).is_err() {
            return false;
        }
        self.pending.insert(height, PendingRequest { peer, sent_at: now });
        true
    }

    /// Random eligible peer for `height`. Clean peers first; an idle suspect
    /// is used only when no clean peer is free, and never the peer that
    /// last timed out on this height.
    fn pick_peer(&mut self, height: u64) -> Option<PeerId> {
        let excluded = self.last_timeout_peer.get(&height).copied();
        let mut clean = Vec::new();
        let mut suspects = Vec::new();

        for state in self.peers.values() {
            if !state.is_available() || state.height < height {
                continue;
            }
            if !state.suspect {
                clean.push(state.id);
            } else if Some(state.id) != excluded {
                suspects.push(state.id);
            }
        }

        let mut candidates = if clean.is_empty() { suspects } else { clean };
        if candidates.is_empty() {
            return None;
        }
        // HashMap order is random per process; sort so a seed reproduces.
        candidates.sort_unstable();
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    fn track_starvation(&mut self, front: Option<u64>, now: Instant, outcome: &mut ScheduleOutcome) {
        let Some(height) = front else {
            self.starving_since = None;
            self.last_starvation_warning = None;
            return;
        };

        let since = *self.starving_since.get_or_insert(now);
        let threshold = self.config.starvation_threshold;
        let due = match self.last_starvation_warning {
            None => now.saturating_duration_since(since) >= threshold,
            Some(last) => now.saturating_duration_since(last) >= threshold,
        };
        if due {
            self.last_starvation_warning = Some(now);
            outcome.starving = Some(height);
        }
    }

    // =========================================================================
    // Responses
    // =========================================================================

    /// Buffer a block if it answers the pending request for its height
    /// from this peer. Anything else is ignored.
    pub fn deliver(
        &mut self,
        peer: PeerId,
        block: Block,
        commit: Commit,
        tip_commit: Option<Commit>,
        now: Instant,
    ) -> DeliverOutcome {
        let height = block.height();
        if height < self.height {
            return DeliverOutcome::AlreadyApplied;
        }

        match self.pending.get(&height) {
            Some(request) if request.peer == peer => {}
            _ => {
                return if self.buffer.contains_key(&height) {
                    DeliverOutcome::Duplicate
                } else {
                    DeliverOutcome::Unsolicited
                };
            }
        }

        self.pending.remove(&height);
        if let Some(state) = self.peers.get_mut(&peer) {
            let _ = state.complete_request(height, now);
        }
        self.buffer.insert(
            height,
            BufferedBlock {
                block,
                commit,
                tip_commit,
                peer,
            },
        );
        self.last_busy = now;
        DeliverOutcome::Accepted
    }

    /// Cancel the pending request for `height` after the peer said it has
    /// no such block. Returns true if the request was outstanding.
    pub fn no_block(&mut self, peer: PeerId, height: u64, now: Instant) -> bool {
        if !self.pending.get(&height).is_some_and(|r| r.peer == peer) {
            return false;
        }
        self.pending.remove(&height);
        if let Some(state) = self.peers.get_mut(&peer) {
            let _ = state.abandon_request();
        }
        self.last_busy = now;
        true
    }

    // =========================================================================
    // Pipeline interface
    // =========================================================================

    /// Block at the apply point and the commit that finalizes it: the
    /// commit carried by the buffered successor, or the tip commit.
    pub fn next_ready(&self) -> Option<ReadyBlock> {
        let first = self.buffer.get(&self.height)?;
        let (commit, commit_peer) = match self.buffer.get(&(self.height + 1)) {
            Some(next) => (next.commit.clone(), next.peer),
            None => (first.tip_commit.clone()?, first.peer),
        };
        Some(ReadyBlock {
            height: self.height,
            block: first.block.clone(),
            block_peer: first.peer,
            commit,
            commit_peer,
        })
    }

    /// Advance past an applied height.
    pub fn mark_applied(&mut self, height: u64) -> bool {
        if height != self.height {
            return false;
        }
        self.buffer.remove(&height);
        if let Some(request) = self.pending.remove(&height) {
            if let Some(state) = self.peers.get_mut(&request.peer) {
                let _ = state.abandon_request();
            }
        }
        self.last_timeout_peer.remove(&height);
        self.height += 1;
        true
    }

    /// Evict and ban the peers blamed for a failed verification at
    /// `height`. Their buffered blocks are dropped, so the heights are
    /// re-requested.
    pub fn reject(&mut self, height: u64, offenders: &[PeerId]) -> Vec<PeerId> {
        let mut removed = Vec::with_capacity(offenders.len());
        for peer in offenders {
            self.banned.insert(*peer);
            if self.remove_peer(peer).is_some() {
                removed.push(*peer);
            }
        }
        debug!(height, removed = removed.len(), "[fast-sync] Rejected block");
        removed
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Completion predicate, including the quiescence window.
    pub fn is_caught_up(&self, now: Instant) -> bool {
        let has_peer = self.peers.values().any(PeerState::has_status);
        has_peer
            && self.height > self.max_peer_height
            && self.pending.is_empty()
            && self.buffer.range(..=self.max_peer_height).next().is_none()
            && now.saturating_duration_since(self.last_busy) >= self.config.quiescence_window
    }

    /// True exactly once, the first time the pool is caught up.
    pub fn caught_up_event(&mut self, now: Instant) -> bool {
        if self.caught_up_emitted || !self.is_caught_up(now) {
            return false;
        }
        self.caught_up_emitted = true;
        true
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Next height to apply.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Highest height claimed by a known peer.
    pub fn max_peer_height(&self) -> u64 {
        self.max_peer_height
    }

    /// Record of one peer.
    pub fn peer(&self, peer: &PeerId) -> Option<&PeerState> {
        self.peers.get(peer)
    }

    /// Ids of registered peers.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Peer assigned to `height`, if a request is outstanding.
    pub fn pending_peer(&self, height: u64) -> Option<PeerId> {
        self.pending.get(&height).map(|r| r.peer)
    }

    /// Heights currently buffered.
    pub fn buffered_heights(&self) -> Vec<u64> {
        self.buffer.keys().copied().collect()
    }

    /// Progress snapshot.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            height: self.height,
            max_peer_height: self.max_peer_height,
            peers: self.peers.len(),
            pending: self.pending.len(),
            buffered: self.buffer.len(),
        }
    }
}
