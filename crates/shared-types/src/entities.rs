//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Hash`, `Address`, `PeerId`
//! - **Chain**: `PartSetHeader`, `BlockId`, `BlockHeader`, `Block`
//! - **Consensus**: `CommitSig`, `Commit`, `Validator`, `ValidatorSet`

use crate::errors::TypeError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::{merkle_root, sha256};
use std::fmt;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// A 20-byte validator address (truncated hash of the public key).
pub type Address = [u8; 20];

/// Size of one block part when computing the part-set header.
pub const BLOCK_PART_SIZE_BYTES: usize = 65_536;

/// Opaque identifier of a remote peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic id for in-process nodes: `index` in the first byte.
    pub fn from_index(index: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes[0] = index;
        Self(bytes)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..6]))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// Number and Merkle root of the parts a block is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PartSetHeader {
    /// Number of parts.
    pub total: u32,
    /// Merkle root over the part hashes.
    pub hash: Hash,
}

/// Identifies a block by header hash and part-set header.
///
/// The zero value is the genesis reference: the `last_block_id` of block 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct BlockId {
    /// Hash of the block header.
    pub hash: Hash,
    /// Part-set header of the serialized block.
    pub parts: PartSetHeader,
}

impl BlockId {
    /// True for the genesis reference.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.parts.total.to_be_bytes());
        out.extend_from_slice(&self.parts.hash);
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(&self.hash[..6]), self.parts.total)
    }
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Chain the block belongs to.
    pub chain_id: String,
    /// Height, starting at 1.
    pub height: u64,
    /// Proposal time, unix milliseconds.
    pub time: u64,
    /// Id of the previous block, zero at height 1.
    pub last_block_id: BlockId,
    /// Hash of the commit finalizing the previous block.
    pub last_commit_hash: Hash,
    /// Merkle root of the transactions.
    pub data_hash: Hash,
    /// Hash of the validator set that signs this block.
    pub validators_hash: Hash,
    /// Application state after executing the previous block.
    pub app_hash: Hash,
    /// Address of the proposing validator.
    pub proposer_address: Address,
}

impl BlockHeader {
    /// Canonical byte layout used for hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        encode_bytes(&mut out, self.chain_id.as_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.time.to_be_bytes());
        self.last_block_id.encode_into(&mut out);
        out.extend_from_slice(&self.last_commit_hash);
        out.extend_from_slice(&self.data_hash);
        out.extend_from_slice(&self.validators_hash);
        out.extend_from_slice(&self.app_hash);
        out.extend_from_slice(&self.proposer_address);
        out
    }

    /// SHA-256 of the canonical header bytes.
    pub fn hash(&self) -> Hash {
        sha256(&self.canonical_bytes())
    }
}

/// A block: header plus opaque transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Opaque transaction payloads.
    pub txs: Vec<Vec<u8>>,
}

impl Block {
    /// Height of the block.
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Header hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Merkle root over the transactions; must equal `header.data_hash`.
    pub fn compute_data_hash(txs: &[Vec<u8>]) -> Hash {
        let leaves: Vec<&[u8]> = txs.iter().map(Vec::as_slice).collect();
        merkle_root(&leaves)
    }

    /// Full canonical encoding: header followed by length-prefixed txs.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.header.canonical_bytes();
        out.extend_from_slice(&(self.txs.len() as u64).to_be_bytes());
        for tx in &self.txs {
            encode_bytes(&mut out, tx);
        }
        out
    }

    /// Part-set header over the canonical encoding split into
    /// `BLOCK_PART_SIZE_BYTES` chunks.
    pub fn part_set_header(&self) -> PartSetHeader {
        let bytes = self.canonical_bytes();
        let parts: Vec<&[u8]> = bytes.chunks(BLOCK_PART_SIZE_BYTES).collect();
        PartSetHeader {
            total: parts.len() as u32,
            hash: merkle_root(&parts),
        }
    }

    /// Block id: header hash plus part-set header.
    pub fn block_id(&self) -> BlockId {
        BlockId {
            hash: self.hash(),
            parts: self.part_set_header(),
        }
    }
}

// =============================================================================
// CLUSTER C: CONSENSUS
// =============================================================================

/// Vote type tag for precommits in the sign-bytes layout.
pub const PRECOMMIT_TYPE: u8 = 0x02;

/// Canonical bytes a validator signs for a precommit.
pub fn vote_sign_bytes(
    chain_id: &str,
    height: u64,
    round: u32,
    block_id: &BlockId,
    timestamp: u64,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    out.push(PRECOMMIT_TYPE);
    encode_bytes(&mut out, chain_id.as_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&round.to_be_bytes());
    block_id.encode_into(&mut out);
    out.extend_from_slice(&timestamp.to_be_bytes());
    out
}

/// One validator's slot in a commit.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSig {
    /// Address of the validator.
    pub validator_address: Address,
    /// Vote time, unix milliseconds.
    pub timestamp: u64,
    /// Precommit signature, `None` when the validator did not vote.
    #[serde_as(as = "Option<Bytes>")]
    pub signature: Option<Signature>,
}

impl CommitSig {
    /// Slot for a validator that did not vote.
    pub fn absent(validator_address: Address) -> Self {
        Self {
            validator_address,
            timestamp: 0,
            signature: None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.validator_address);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        match &self.signature {
            Some(sig) => {
                out.push(1);
                out.extend_from_slice(sig);
            }
            None => out.push(0),
        }
    }
}

/// Precommit signatures finalizing a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Commit {
    /// Height of the finalized block.
    pub height: u64,
    /// Consensus round the block was committed in.
    pub round: u32,
    /// Id of the finalized block.
    pub block_id: BlockId,
    /// One entry per signing slot.
    pub signatures: Vec<CommitSig>,
}

impl Commit {
    /// The commit carried by block 1: nothing precedes it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True for a commit with no height and no signatures.
    pub fn is_empty(&self) -> bool {
        self.height == 0 && self.signatures.is_empty()
    }

    /// Merkle root over the encoded signature slots, prefixed by the
    /// commit's height, round and block id.
    pub fn hash(&self) -> Hash {
        let mut head = Vec::with_capacity(80);
        head.extend_from_slice(&self.height.to_be_bytes());
        head.extend_from_slice(&self.round.to_be_bytes());
        self.block_id.encode_into(&mut head);

        let encoded: Vec<Vec<u8>> = self
            .signatures
            .iter()
            .map(|sig| {
                let mut out = Vec::with_capacity(100);
                sig.encode_into(&mut out);
                out
            })
            .collect();

        let mut leaves: Vec<&[u8]> = Vec::with_capacity(encoded.len() + 1);
        leaves.push(&head);
        leaves.extend(encoded.iter().map(Vec::as_slice));
        merkle_root(&leaves)
    }

    /// Sign-bytes for the slot at `index`.
    pub fn vote_sign_bytes(&self, chain_id: &str, index: usize) -> Option<Vec<u8>> {
        let sig = self.signatures.get(index)?;
        Some(vote_sign_bytes(
            chain_id,
            self.height,
            self.round,
            &self.block_id,
            sig.timestamp,
        ))
    }
}

/// A validator allowed to sign commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Address derived from the public key.
    pub address: Address,
    /// Ed25519 public key.
    pub pub_key: PublicKey,
    /// Voting weight.
    pub voting_power: u64,
}

/// Validators sorted by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_voting_power: u64,
}

impl ValidatorSet {
    /// Build a set, sorting by address.
    ///
    /// Rejects empty sets, duplicate addresses and zero-power validators.
    pub fn new(mut validators: Vec<Validator>) -> Result<Self, TypeError> {
        if validators.is_empty() {
            return Err(TypeError::EmptyValidatorSet);
        }
        validators.sort_by(|a, b| a.address.cmp(&b.address));

        let mut total: u64 = 0;
        for (i, v) in validators.iter().enumerate() {
            if v.voting_power == 0 {
                return Err(TypeError::ZeroVotingPower {
                    address: hex::encode(v.address),
                });
            }
            if i > 0 && validators[i - 1].address == v.address {
                return Err(TypeError::DuplicateValidator {
                    address: hex::encode(v.address),
                });
            }
            total = total
                .checked_add(v.voting_power)
                .ok_or(TypeError::VotingPowerOverflow)?;
        }

        Ok(Self {
            validators,
            total_voting_power: total,
        })
    }

    /// Sum of all voting power.
    pub fn total_voting_power(&self) -> u64 {
        self.total_voting_power
    }

    /// Look up a validator by address.
    pub fn get_by_address(&self, address: &Address) -> Option<&Validator> {
        self.validators
            .binary_search_by(|v| v.address.cmp(address))
            .ok()
            .map(|i| &self.validators[i])
    }

    /// Validators in address order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Merkle root over `(address, pub_key, voting_power)` of each member.
    pub fn hash(&self) -> Hash {
        let encoded: Vec<Vec<u8>> = self
            .validators
            .iter()
            .map(|v| {
                let mut out = Vec::with_capacity(60);
                out.extend_from_slice(&v.address);
                out.extend_from_slice(&v.pub_key);
                out.extend_from_slice(&v.voting_power.to_be_bytes());
                out
            })
            .collect();
        let leaves: Vec<&[u8]> = encoded.iter().map(Vec::as_slice).collect();
        merkle_root(&leaves)
    }
}

fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(seed: u8, power: u64) -> Validator {
        Validator {
            address: [seed; 20],
            pub_key: [seed; 32],
            voting_power: power,
        }
    }

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            chain_id: "test-chain".into(),
            height,
            time: 1_000 + height,
            ..Default::default()
        }
    }

    #[test]
    fn test_header_hash_changes_with_any_field() {
        let base = header(5);
        let mut other = base.clone();
        other.app_hash = [1; 32];
        assert_ne!(base.hash(), other.hash());

        let mut other = base.clone();
        other.chain_id = "other-chain".into();
        assert_ne!(base.hash(), other.hash());
    }

    #[test]
    fn test_block_id_of_block_is_deterministic() {
        let block = Block {
            header: header(1),
            txs: vec![b"tx-1".to_vec(), b"tx-2".to_vec()],
        };
        assert_eq!(block.block_id(), block.clone().block_id());
        assert_eq!(block.block_id().parts.total, 1);
        assert!(!block.block_id().is_zero());
    }

    #[test]
    fn test_large_block_splits_into_parts() {
        let block = Block {
            header: header(2),
            txs: vec![vec![7u8; BLOCK_PART_SIZE_BYTES * 2]],
        };
        assert_eq!(block.part_set_header().total, 3);
    }

    #[test]
    fn test_genesis_reference_is_zero() {
        assert!(BlockId::default().is_zero());
    }

    #[test]
    fn test_commit_hash_binds_signatures() {
        let commit = Commit {
            height: 3,
            round: 0,
            block_id: BlockId::default(),
            signatures: vec![CommitSig {
                validator_address: [1; 20],
                timestamp: 10,
                signature: Some([9; 64]),
            }],
        };
        let mut tampered = commit.clone();
        tampered.signatures[0].signature = Some([8; 64]);
        assert_ne!(commit.hash(), tampered.hash());

        let mut absent = commit.clone();
        absent.signatures[0] = CommitSig::absent([1; 20]);
        assert_ne!(commit.hash(), absent.hash());
    }

    #[test]
    fn test_empty_commit() {
        assert!(Commit::empty().is_empty());
        assert_eq!(Commit::empty().hash(), Commit::default().hash());
    }

    #[test]
    fn test_vote_sign_bytes_differ_by_height() {
        let id = BlockId::default();
        assert_ne!(
            vote_sign_bytes("c", 1, 0, &id, 5),
            vote_sign_bytes("c", 2, 0, &id, 5)
        );
    }

    #[test]
    fn test_validator_set_sorted_and_totalled() {
        let set = ValidatorSet::new(vec![validator(3, 10), validator(1, 5)]).unwrap();
        assert_eq!(set.total_voting_power(), 15);
        assert_eq!(set.validators()[0].address, [1; 20]);
        assert_eq!(set.get_by_address(&[3; 20]).map(|v| v.voting_power), Some(10));
        assert!(set.get_by_address(&[2; 20]).is_none());
    }

    #[test]
    fn test_validator_set_rejects_duplicates_and_zero_power() {
        assert!(matches!(
            ValidatorSet::new(vec![validator(1, 1), validator(1, 2)]),
            Err(TypeError::DuplicateValidator { .. })
        ));
        assert!(matches!(
            ValidatorSet::new(vec![validator(1, 0)]),
            Err(TypeError::ZeroVotingPower { .. })
        ));
        assert_eq!(ValidatorSet::new(vec![]), Err(TypeError::EmptyValidatorSet));
    }

    #[test]
    fn test_commit_serde_roundtrip_keeps_absent_votes() {
        let commit = Commit {
            height: 1,
            round: 2,
            block_id: BlockId::default(),
            signatures: vec![
                CommitSig::absent([4; 20]),
                CommitSig {
                    validator_address: [5; 20],
                    timestamp: 1,
                    signature: Some([6; 64]),
                },
            ],
        };
        let bytes = bincode::serialize(&commit).unwrap();
        let decoded: Commit = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, commit);
    }

    #[test]
    fn test_peer_id_display_is_short_hex() {
        assert_eq!(PeerId::from_index(1).to_string(), "010000000000");
    }
}
