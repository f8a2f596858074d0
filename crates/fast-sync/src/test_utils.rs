//! Test fixtures: deterministic signed chains and recording port fakes.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for the
//! workspace test suite.

#![allow(clippy::expect_used)]

use crate::adapters::{codec::SyncCodec, DeterministicExecutor};
use crate::domain::{ChainState, Genesis, PeerFault, SyncMessage, TransportError};
use crate::ports::outbound::{BlockExecutor, ConsensusHandoff, Transport, TransportEvent};
use block_store::{BlockStore, BlockStoreService, InMemoryKVStore, StoreConfig};
use parking_lot::Mutex;
use shared_crypto::Ed25519KeyPair;
use shared_types::{
    vote_sign_bytes, Block, BlockHeader, BlockId, Commit, CommitSig, PeerId, Validator,
    ValidatorSet,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Default genesis time of built chains, unix milliseconds.
pub const DEFAULT_GENESIS_TIME: u64 = 1_700_000_000_000;

const BLOCK_INTERVAL_MS: u64 = 1_000;

/// Builds chains signed by a fixed set of validators.
///
/// Validator keys derive from their index only, so two builders that
/// differ in genesis time share validators but produce incompatible chains.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    chain_id: String,
    powers: Vec<u64>,
    genesis_time: u64,
    txs_per_block: usize,
}

impl ChainBuilder {
    /// One validator with power 10, one tx per block.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            powers: vec![10],
            genesis_time: DEFAULT_GENESIS_TIME,
            txs_per_block: 1,
        }
    }

    /// One validator per entry, with that voting power.
    pub fn with_validators(mut self, powers: &[u64]) -> Self {
        self.powers = powers.to_vec();
        self
    }

    /// Override the genesis time.
    pub fn genesis_time(mut self, genesis_time: u64) -> Self {
        self.genesis_time = genesis_time;
        self
    }

    /// Transactions in every block.
    pub fn txs_per_block(mut self, n: usize) -> Self {
        self.txs_per_block = n;
        self
    }

    fn keypairs(&self) -> Vec<Ed25519KeyPair> {
        (0..self.powers.len())
            .map(|i| Ed25519KeyPair::from_seed([(i as u8).wrapping_add(1); 32]))
            .collect()
    }

    /// The validator set.
    pub fn validator_set(&self) -> ValidatorSet {
        let validators = self
            .keypairs()
            .iter()
            .zip(&self.powers)
            .map(|(kp, power)| Validator {
                address: kp.address(),
                pub_key: *kp.public_key().as_bytes(),
                voting_power: *power,
            })
            .collect();
        ValidatorSet::new(validators).expect("valid validator powers")
    }

    /// Genesis of the chain.
    pub fn genesis(&self) -> Genesis {
        Genesis::new(self.chain_id.clone(), self.genesis_time, self.validator_set())
    }

    /// Commit in which every validator signs `block_id`.
    pub fn sign_commit(&self, height: u64, block_id: BlockId, timestamp: u64) -> Commit {
        let keys = self.keypairs();
        let validators = self.validator_set();
        let signatures = validators
            .validators()
            .iter()
            .map(|v| {
                let kp = keys
                    .iter()
                    .find(|kp| kp.address() == v.address)
                    .expect("key for every validator");
                let msg = vote_sign_bytes(&self.chain_id, height, 0, &block_id, timestamp);
                CommitSig {
                    validator_address: v.address,
                    timestamp,
                    signature: Some(kp.sign(&msg).to_bytes()),
                }
            })
            .collect();
        Commit {
            height,
            round: 0,
            block_id,
            signatures,
        }
    }

    /// Build `n` blocks on top of genesis.
    pub fn build(&self, n: u64) -> TestChain {
        let genesis = self.genesis();
        let executor = DeterministicExecutor::new();
        let validators = genesis.validators.clone();
        let mut states = vec![ChainState::from_genesis(&genesis)];
        let mut blocks = Vec::with_capacity(n as usize);
        let mut commits: Vec<Commit> = Vec::with_capacity(n as usize);

        for height in 1..=n {
            let state = states.last().expect("genesis state").clone();
            let txs: Vec<Vec<u8>> = (0..self.txs_per_block)
                .map(|i| format!("{}/{height}/{i}", self.chain_id).into_bytes())
                .collect();
            let last_commit_hash = commits
                .last()
                .map(Commit::hash)
                .unwrap_or_else(|| Commit::empty().hash());
            let proposer = &validators.validators()[(height as usize) % validators.len()];
            let time = self.genesis_time + height * BLOCK_INTERVAL_MS;

            let block = Block {
                header: BlockHeader {
                    chain_id: self.chain_id.clone(),
                    height,
                    time,
                    last_block_id: state.last_block_id.clone(),
                    last_commit_hash,
                    data_hash: Block::compute_data_hash(&txs),
                    validators_hash: state.validators.hash(),
                    app_hash: state.app_hash,
                    proposer_address: proposer.address,
                },
                txs,
            };
            let block_id = block.block_id();
            commits.push(self.sign_commit(height, block_id.clone(), time + BLOCK_INTERVAL_MS / 2));
            states.push(
                executor
                    .apply(&state, block_id, &block)
                    .expect("built block applies"),
            );
            blocks.push(block);
        }

        let final_state = states.last().expect("genesis state").clone();
        TestChain {
            genesis,
            blocks,
            commits,
            final_state,
            states,
        }
    }
}

/// A built chain.
#[derive(Debug, Clone)]
pub struct TestChain {
    /// Genesis parameters.
    pub genesis: Genesis,
    /// Blocks `1..=n`, index `h - 1`.
    pub blocks: Vec<Block>,
    /// Commit finalizing each block, index `h - 1`.
    pub commits: Vec<Commit>,
    /// State after the last block.
    pub final_state: ChainState,
    states: Vec<ChainState>,
}

impl TestChain {
    /// Number of blocks.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// State before block 1.
    pub fn genesis_state(&self) -> ChainState {
        ChainState::from_genesis(&self.genesis)
    }

    /// State after applying block `height`.
    pub fn state_after(&self, height: u64) -> ChainState {
        self.states[height as usize].clone()
    }

    /// Block at `height`.
    pub fn block(&self, height: u64) -> &Block {
        &self.blocks[(height - 1) as usize]
    }

    /// Commit finalizing block `height`.
    pub fn commit(&self, height: u64) -> &Commit {
        &self.commits[(height - 1) as usize]
    }

    /// What a node holding blocks `1..=tip` answers to a request for
    /// `height`.
    pub fn block_response(&self, height: u64, tip: u64) -> SyncMessage {
        let commit = if height == 1 {
            Commit::empty()
        } else {
            self.commit(height - 1).clone()
        };
        let tip_commit = (height == tip).then(|| self.commit(height).clone());
        SyncMessage::BlockResponse {
            block: self.block(height).clone(),
            commit,
            tip_commit,
        }
    }

    /// Save blocks `1..=up_to` into `store`.
    pub fn populate(&self, store: &dyn BlockStore, up_to: u64) {
        for height in 1..=up_to {
            store
                .save_block(self.block(height), self.commit(height))
                .expect("contiguous save");
        }
    }

    /// Fresh in-memory store holding blocks `1..=up_to`.
    pub fn store(&self, up_to: u64) -> Arc<BlockStoreService<InMemoryKVStore>> {
        let store = Arc::new(BlockStoreService::new_in_memory(StoreConfig::default()));
        self.populate(store.as_ref(), up_to);
        store
    }
}

/// Encode `message` as a transport event from `peer`.
pub fn message_event(peer: PeerId, message: &SyncMessage) -> TransportEvent {
    TransportEvent::Message {
        peer,
        payload: SyncCodec::default()
            .encode(message)
            .expect("test message encodes"),
    }
}

/// [`Transport`] that records everything and delivers nothing.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(PeerId, SyncMessage)>>,
    broadcasts: Mutex<Vec<SyncMessage>>,
    reported: Mutex<Vec<(PeerId, PeerFault)>>,
    unreachable: Mutex<HashSet<PeerId>>,
}

impl RecordingTransport {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `peer` fail.
    pub fn set_unreachable(&self, peer: PeerId) {
        self.unreachable.lock().insert(peer);
    }

    /// Drain recorded unicast messages.
    pub fn take_sent(&self) -> Vec<(PeerId, SyncMessage)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Drain recorded block requests as `(peer, height)`.
    pub fn take_requests(&self) -> Vec<(PeerId, u64)> {
        self.take_sent()
            .into_iter()
            .filter_map(|(peer, msg)| match msg {
                SyncMessage::BlockRequest { height } => Some((peer, height)),
                _ => None,
            })
            .collect()
    }

    /// Recorded broadcasts.
    pub fn broadcasts(&self) -> Vec<SyncMessage> {
        self.broadcasts.lock().clone()
    }

    /// Recorded peer reports.
    pub fn reported(&self) -> Vec<(PeerId, PeerFault)> {
        self.reported.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, peer: PeerId, message: &SyncMessage) -> Result<(), TransportError> {
        if self.unreachable.lock().contains(&peer) {
            return Err(TransportError::PeerNotConnected(peer));
        }
        self.sent.lock().push((peer, message.clone()));
        Ok(())
    }

    fn broadcast(&self, message: &SyncMessage) {
        self.broadcasts.lock().push(message.clone());
    }

    fn report_peer(&self, peer: PeerId, fault: &PeerFault) {
        self.reported.lock().push((peer, fault.clone()));
    }
}

/// [`ConsensusHandoff`] that records each call.
#[derive(Default)]
pub struct RecordingHandoff {
    calls: Mutex<Vec<(ChainState, u64)>>,
}

impl RecordingHandoff {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hand-offs.
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Recorded hand-offs.
    pub fn calls(&self) -> Vec<(ChainState, u64)> {
        self.calls.lock().clone()
    }
}

impl ConsensusHandoff for RecordingHandoff {
    fn switch_to_consensus(&self, state: ChainState, blocks_synced: u64) {
        self.calls.lock().push((state, blocks_synced));
    }
}
