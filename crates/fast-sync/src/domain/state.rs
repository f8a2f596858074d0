//! Chain state handed between the executor, the pipeline and consensus.

use serde::{Deserialize, Serialize};
use shared_crypto::sha256_many;
use shared_types::{BlockId, Hash, ValidatorSet};

/// Genesis parameters of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// Chain id.
    pub chain_id: String,
    /// Genesis time, unix milliseconds.
    pub genesis_time: u64,
    /// Initial validator set.
    pub validators: ValidatorSet,
    /// Application state before block 1.
    pub app_hash: Hash,
}

impl Genesis {
    /// Genesis whose initial app hash commits to the chain id and time.
    pub fn new(chain_id: impl Into<String>, genesis_time: u64, validators: ValidatorSet) -> Self {
        let chain_id = chain_id.into();
        let app_hash = sha256_many(&[chain_id.as_bytes(), &genesis_time.to_be_bytes()]);
        Self {
            chain_id,
            genesis_time,
            validators,
            app_hash,
        }
    }
}

/// State after the last applied block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    /// Chain id.
    pub chain_id: String,
    /// Height of the last applied block, 0 at genesis.
    pub last_block_height: u64,
    /// Id of the last applied block, zero at genesis.
    pub last_block_id: BlockId,
    /// Time of the last applied block, genesis time at genesis.
    pub last_block_time: u64,
    /// Validators that sign the next block.
    pub validators: ValidatorSet,
    /// Application state after the last applied block.
    pub app_hash: Hash,
}

impl ChainState {
    /// State before block 1.
    pub fn from_genesis(genesis: &Genesis) -> Self {
        Self {
            chain_id: genesis.chain_id.clone(),
            last_block_height: 0,
            last_block_id: BlockId::default(),
            last_block_time: genesis.genesis_time,
            validators: genesis.validators.clone(),
            app_hash: genesis.app_hash,
        }
    }
}
