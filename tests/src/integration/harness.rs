//! Node harness: one reactor task per node on a shared `MemoryNetwork`.

#![allow(clippy::expect_used)]

use block_store::{BlockStore, BlockStoreService, InMemoryKVStore};
use fast_sync::test_utils::{RecordingHandoff, TestChain};
use fast_sync::{
    DeterministicExecutor, Ed25519SignatureVerifier, FastSyncConfig, MemoryNetwork, SyncApi,
    SyncError, SyncPorts, SyncReactor,
};
use shared_types::{Block, PeerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Upper bound for any wait in the scenarios.
pub const WAIT_LIMIT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A running node.
pub struct SyncNode {
    /// Network identity.
    pub id: PeerId,
    /// The reactor, shared with its task.
    pub reactor: Arc<SyncReactor>,
    /// Local block store.
    pub store: Arc<BlockStoreService<InMemoryKVStore>>,
    /// Records the hand-off to consensus.
    pub handoff: Arc<RecordingHandoff>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), SyncError>>,
}

impl SyncNode {
    /// Register `id` on `network`, load blocks `1..=stored` of `chain` and
    /// start the reactor. Nodes with `fast_sync` false only serve.
    pub fn spawn(
        network: &MemoryNetwork,
        id: u8,
        chain: &TestChain,
        stored: u64,
        fast_sync: bool,
        config: FastSyncConfig,
    ) -> Self {
        sync_telemetry::init_test_logging();

        let id = PeerId::from_index(id);
        let (transport, events) = network.register(id);
        let store = chain.store(stored);
        let handoff = Arc::new(RecordingHandoff::new());

        let reactor = SyncReactor::new(
            config,
            chain.state_after(stored),
            SyncPorts {
                store: store.clone(),
                executor: Arc::new(DeterministicExecutor::new()),
                verifier: Arc::new(Ed25519SignatureVerifier),
                transport,
                consensus: handoff.clone(),
            },
            fast_sync,
        )
        .expect("reactor config is valid");
        let reactor = Arc::new(reactor);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&reactor).run(events, shutdown_rx));

        Self {
            id,
            reactor,
            store,
            handoff,
            shutdown,
            task,
        }
    }

    /// Serving-only node holding blocks `1..=stored`.
    pub fn server(network: &MemoryNetwork, id: u8, chain: &TestChain, stored: u64) -> Self {
        Self::spawn(network, id, chain, stored, false, FastSyncConfig::for_testing())
    }

    /// Empty node that fast-syncs.
    pub fn joiner(network: &MemoryNetwork, id: u8, chain: &TestChain) -> Self {
        Self::spawn(network, id, chain, 0, true, FastSyncConfig::for_testing())
    }

    /// Height of the local store.
    pub fn height(&self) -> u64 {
        self.store.height()
    }

    /// Whether the node has handed off to consensus.
    pub fn switched(&self) -> bool {
        self.handoff.count() > 0
    }

    /// Block at `height`, if stored.
    pub fn block(&self, height: u64) -> Option<Block> {
        self.store.load_block(height).expect("in-memory store reads")
    }

    /// True while the reactor task has not returned.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the reactor and return its result.
    pub async fn stop(self) -> Result<(), SyncError> {
        let _ = self.shutdown.send(true);
        self.task.await.expect("reactor task does not panic")
    }

    /// Still syncing according to the reactor.
    pub fn is_syncing(&self) -> bool {
        self.reactor.is_syncing()
    }
}

/// Poll `condition` until it holds or `limit` passes. Returns the last value.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Link every pair in `nodes`.
pub fn connect_all(network: &MemoryNetwork, nodes: &[PeerId]) {
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            network.connect(*a, *b);
        }
    }
}
