//! # Sync Reactor
//!
//! Protocol driver. Turns transport events into pool operations, serves
//! other peers from the local store, runs the verify-apply pipeline on each
//! tick and hands over to consensus once caught up.
//!
//! ## Lock Order
//!
//! `pipeline` before `pool`. Transport calls are never made while the pool
//! lock is held.

use crate::adapters::codec::SyncCodec;
use crate::application::pipeline::VerifyApplyPipeline;
use crate::config::FastSyncConfig;
use crate::domain::{
    BlockPool, ChainState, DeliverOutcome, PeerFault, PoolConfig, SyncError, SyncMessage,
};
use crate::metrics;
use crate::ports::inbound::{SyncApi, SyncStatus};
use crate::ports::outbound::{
    BlockExecutor, ConsensusHandoff, SignatureVerifier, Transport, TransportEvent,
};
use block_store::{BlockStore, StorageError};
use parking_lot::Mutex;
use shared_types::{Block, Commit, PeerId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Collaborators of the reactor.
pub struct SyncPorts {
    /// Local block store, read for serving and written by the pipeline.
    pub store: Arc<dyn BlockStore>,
    /// State-transition function.
    pub executor: Arc<dyn BlockExecutor>,
    /// Commit signature check.
    pub verifier: Arc<dyn SignatureVerifier>,
    /// Messaging to peers.
    pub transport: Arc<dyn Transport>,
    /// Receiver of the hand-off.
    pub consensus: Arc<dyn ConsensusHandoff>,
}

/// Fast-sync protocol driver.
pub struct SyncReactor {
    config: FastSyncConfig,
    pool: Mutex<BlockPool>,
    pipeline: Mutex<VerifyApplyPipeline>,
    store: Arc<dyn BlockStore>,
    transport: Arc<dyn Transport>,
    consensus: Arc<dyn ConsensusHandoff>,
    codec: SyncCodec,
    syncing: AtomicBool,
    last_status_broadcast: Mutex<Option<Instant>>,
}

impl SyncReactor {
    /// Reactor continuing from `state`, which must match the store tip.
    ///
    /// With `fast_sync` false the reactor only serves peers.
    pub fn new(
        config: FastSyncConfig,
        state: ChainState,
        ports: SyncPorts,
        fast_sync: bool,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let store_height = ports.store.height();
        if state.last_block_height != store_height {
            return Err(SyncError::StateMismatch {
                state_height: state.last_block_height,
                store_height,
            });
        }

        let pool = BlockPool::new(store_height + 1, PoolConfig::from(&config), Instant::now());
        let pipeline = VerifyApplyPipeline::new(
            state,
            Arc::clone(&ports.store),
            ports.executor,
            ports.verifier,
        );

        info!(
            height = store_height,
            fast_sync,
            "[fast-sync] Reactor created"
        );

        Ok(Self {
            config,
            pool: Mutex::new(pool),
            pipeline: Mutex::new(pipeline),
            store: ports.store,
            transport: ports.transport,
            consensus: ports.consensus,
            codec: SyncCodec::default(),
            syncing: AtomicBool::new(fast_sync),
            last_status_broadcast: Mutex::new(None),
        })
    }

    /// Read access to the pool.
    pub fn with_pool<R>(&self, f: impl FnOnce(&BlockPool) -> R) -> R {
        f(&self.pool.lock())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Process one transport event.
    pub fn handle_event(&self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::PeerConnected(peer) => self.on_peer_connected(peer),
            TransportEvent::PeerDisconnected(peer) => {
                if self.pool.lock().peer_disconnected(&peer).is_some() {
                    debug!(%peer, "[fast-sync] Peer disconnected");
                }
            }
            TransportEvent::SendFailed { peer } => self.evict(peer, PeerFault::SendFailed),
            TransportEvent::Message { peer, payload } => match self.codec.decode(&payload) {
                Ok(message) => self.handle_message(peer, message, now),
                Err(e) => self.evict(peer, PeerFault::Malformed(e.to_string())),
            },
        }
    }

    fn on_peer_connected(&self, peer: PeerId) {
        if self.is_syncing() {
            self.pool.lock().add_peer(peer);
        }
        debug!(%peer, "[fast-sync] Peer connected");
        self.send_or_evict(
            peer,
            &SyncMessage::StatusResponse {
                height: self.store.height(),
            },
        );
        self.send_or_evict(peer, &SyncMessage::StatusRequest);
    }

    fn handle_message(&self, peer: PeerId, message: SyncMessage, now: Instant) {
        debug!(%peer, kind = message.kind(), "[fast-sync] Received message");
        match message {
            SyncMessage::StatusRequest => self.send_or_evict(
                peer,
                &SyncMessage::StatusResponse {
                    height: self.store.height(),
                },
            ),
            SyncMessage::StatusResponse { height } => {
                if !self.is_syncing() {
                    return;
                }
                let result = self.pool.lock().set_peer_height(peer, height, now);
                if let Err(fault) = result {
                    self.evict(peer, fault);
                }
            }
            SyncMessage::BlockRequest { height } => {
                let response = self.serve_block(height);
                self.send_or_evict(peer, &response);
            }
            SyncMessage::BlockResponse {
                block,
                commit,
                tip_commit,
            } => self.on_block_response(peer, block, commit, tip_commit, now),
            SyncMessage::NoBlockResponse { height } => {
                if !self.is_syncing() {
                    return;
                }
                let solicited = self.pool.lock().no_block(peer, height, now);
                if solicited {
                    self.evict(peer, PeerFault::NoBlock { height });
                } else {
                    debug!(%peer, height, "[fast-sync] Ignoring unsolicited no-block response");
                }
            }
        }
    }

    fn on_block_response(
        &self,
        peer: PeerId,
        block: Block,
        commit: Commit,
        tip_commit: Option<Commit>,
        now: Instant,
    ) {
        if !self.is_syncing() {
            return;
        }
        if let Err(reason) = check_response(&block, &commit, tip_commit.as_ref()) {
            self.evict(peer, PeerFault::Malformed(reason));
            return;
        }

        let height = block.height();
        let outcome = self
            .pool
            .lock()
            .deliver(peer, block, commit, tip_commit, now);
        match outcome {
            DeliverOutcome::Accepted => self.schedule_and_send(now),
            other => debug!(%peer, height, outcome = ?other, "[fast-sync] Block response ignored"),
        }
    }

    /// Response to a `BlockRequest` for `height` from the local store.
    fn serve_block(&self, height: u64) -> SyncMessage {
        match self.load_response(height) {
            Ok(Some(response)) => response,
            Ok(None) => SyncMessage::NoBlockResponse { height },
            Err(e) => {
                warn!(height, error = %e, "[fast-sync] Failed to load block for peer");
                SyncMessage::NoBlockResponse { height }
            }
        }
    }

    fn load_response(&self, height: u64) -> Result<Option<SyncMessage>, StorageError> {
        let tip = self.store.height();
        if height == 0 || height > tip || height < self.store.base() {
            return Ok(None);
        }
        let Some(block) = self.store.load_block(height)? else {
            return Ok(None);
        };
        let commit = if height == 1 {
            Commit::empty()
        } else {
            match self.store.load_seen_commit(height - 1)? {
                Some(commit) => commit,
                None => return Ok(None),
            }
        };
        let tip_commit = if height == tip {
            self.store.load_seen_commit(height)?
        } else {
            None
        };
        Ok(Some(SyncMessage::BlockResponse {
            block,
            commit,
            tip_commit,
        }))
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// One control-loop step: status broadcast, scheduling, pipeline drain
    /// and the completion check. Errors are fatal.
    pub fn tick(&self, now: Instant) -> Result<(), SyncError> {
        self.broadcast_status_if_due(now);
        if !self.is_syncing() {
            return Ok(());
        }

        self.schedule_and_send(now);

        let report = self
            .pipeline
            .lock()
            .drain(&self.pool, self.config.max_blocks_per_tick)?;
        for (peer, fault) in report.rejected {
            self.punish(peer, &fault);
        }
        if report.applied > 0 {
            self.schedule_and_send(now);
        }

        let (status, caught_up) = {
            let mut pool = self.pool.lock();
            (pool.status(), pool.caught_up_event(now))
        };
        metrics::set_progress(status.height, status.max_peer_height, status.pending);

        if caught_up {
            self.switch_to_consensus();
        }
        Ok(())
    }

    /// Own height goes out every status period, syncing or not, so peers
    /// behind this node can find it.
    fn broadcast_status_if_due(&self, now: Instant) {
        let due = {
            let mut last = self.last_status_broadcast.lock();
            let due = last.map_or(true, |t| {
                now.saturating_duration_since(t) >= self.config.status_update_interval()
            });
            if due {
                *last = Some(now);
            }
            due
        };
        if due {
            self.transport.broadcast(&SyncMessage::StatusResponse {
                height: self.store.height(),
            });
        }
    }

    fn schedule_and_send(&self, now: Instant) {
        let outcome = self.pool.lock().schedule(now);

        for (peer, fault) in &outcome.evicted {
            self.punish(*peer, fault);
        }
        for request in &outcome.requests {
            let message = SyncMessage::BlockRequest {
                height: request.height,
            };
            if let Err(e) = self.transport.send(request.peer, &message) {
                debug!(peer = %request.peer, height = request.height, error = %e, "[fast-sync] Block request not sent");
                self.evict(request.peer, PeerFault::SendFailed);
            }
        }
        if let Some(height) = outcome.starving {
            warn!(
                height,
                peers = self.pool.lock().peer_ids().len(),
                "[fast-sync] No peer available for next height, requesting status"
            );
            self.transport.broadcast(&SyncMessage::StatusRequest);
        }
    }

    fn switch_to_consensus(&self) {
        if !self.syncing.swap(false, Ordering::SeqCst) {
            return;
        }
        let (state, blocks_synced) = {
            let pipeline = self.pipeline.lock();
            (pipeline.state().clone(), pipeline.blocks_synced())
        };
        info!(
            height = state.last_block_height,
            blocks_synced,
            "[fast-sync] Caught up, switching to consensus"
        );
        self.consensus.switch_to_consensus(state, blocks_synced);
    }

    // =========================================================================
    // Peer punishment
    // =========================================================================

    fn send_or_evict(&self, peer: PeerId, message: &SyncMessage) {
        if let Err(e) = self.transport.send(peer, message) {
            debug!(%peer, kind = message.kind(), error = %e, "[fast-sync] Send failed");
            self.evict(peer, PeerFault::SendFailed);
        }
    }

    /// Remove from the pool, then report. Violations keep the peer out of
    /// the pool until it disconnects.
    fn evict(&self, peer: PeerId, fault: PeerFault) {
        self.pool.lock().evict_peer(&peer, &fault);
        self.punish(peer, &fault);
    }

    /// Report a peer already removed from the pool.
    fn punish(&self, peer: PeerId, fault: &PeerFault) {
        warn!(
            %peer,
            reason = %fault,
            violation = fault.is_violation(),
            "[fast-sync] Evicting peer"
        );
        metrics::record_peer_evicted(fault.label());
        self.transport.report_peer(peer, fault);
    }

    // =========================================================================
    // Control loop
    // =========================================================================

    /// Drive the reactor until shutdown, transport close or a fatal error.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let mut idle = !self.is_syncing();
        let mut ticker = interval(self.tick_period(idle));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[fast-sync] Reactor shutting down");
                        return Ok(());
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, Instant::now()),
                    None => {
                        info!("[fast-sync] Transport closed, reactor stopping");
                        return Ok(());
                    }
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Instant::now()) {
                        error!(error = %e, "[fast-sync] Reactor halted");
                        return Err(e);
                    }
                    if !idle && !self.is_syncing() {
                        idle = true;
                        ticker = interval(self.tick_period(idle));
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                }
            }
        }
    }

    fn tick_period(&self, idle: bool) -> std::time::Duration {
        if idle {
            self.config.idle_tick_interval()
        } else {
            self.config.tick_interval()
        }
    }
}

/// Shape checks on a block response before it reaches the pool.
fn check_response(block: &Block, commit: &Commit, tip_commit: Option<&Commit>) -> Result<(), String> {
    let height = block.height();
    if height == 0 {
        return Err("block at height 0".into());
    }
    if height == 1 {
        if !commit.is_empty() {
            return Err("non-empty commit with block 1".into());
        }
    } else if commit.height != height - 1 {
        return Err(format!(
            "commit for height {} with block {height}",
            commit.height
        ));
    }
    if block.header.last_commit_hash != commit.hash() {
        return Err(format!("commit not bound by block {height}"));
    }
    if let Some(tip) = tip_commit {
        if tip.height != height {
            return Err(format!(
                "tip commit for height {} with block {height}",
                tip.height
            ));
        }
    }
    Ok(())
}

impl SyncApi for SyncReactor {
    fn status(&self) -> SyncStatus {
        let pool = self.pool.lock().status();
        SyncStatus {
            pool,
            store_height: self.store.height(),
            blocks_synced: self.pipeline.lock().blocks_synced(),
            syncing: self.is_syncing(),
        }
    }

    fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    fn chain_state(&self) -> ChainState {
        self.pipeline.lock().state().clone()
    }
}
