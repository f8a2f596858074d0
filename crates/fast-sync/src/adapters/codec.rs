//! # Wire Codec
//!
//! Bincode encoding of [`SyncMessage`] with fixed-width integers and a hard
//! size limit, enforced on both encode and decode.

use crate::domain::{CodecError, SyncMessage};
use bincode::Options;

/// Largest encoded message accepted: a 10 MiB block plus two commits.
pub const MAX_MSG_SIZE_BYTES: usize = 10 * 1024 * 1024 + 64 * 1024;

/// Size-bounded message codec.
#[derive(Debug, Clone, Copy)]
pub struct SyncCodec {
    max_size: usize,
}

impl Default for SyncCodec {
    fn default() -> Self {
        Self::new(MAX_MSG_SIZE_BYTES)
    }
}

impl SyncCodec {
    /// Codec with a custom limit.
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Size limit in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(self.max_size as u64)
    }

    /// Encode a message.
    pub fn encode(&self, message: &SyncMessage) -> Result<Vec<u8>, CodecError> {
        let size = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .serialized_size(message)
            .map_err(|e| CodecError::Encode(e.to_string()))? as usize;
        if size > self.max_size {
            return Err(CodecError::TooLarge {
                size,
                max: self.max_size,
            });
        }
        self.options()
            .serialize(message)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode a message.
    pub fn decode(&self, bytes: &[u8]) -> Result<SyncMessage, CodecError> {
        if bytes.len() > self.max_size {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }
        self.options()
            .deserialize(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Block, BlockHeader, Commit};

    fn response(tx_bytes: usize) -> SyncMessage {
        SyncMessage::BlockResponse {
            block: Block {
                header: BlockHeader {
                    chain_id: "codec".into(),
                    height: 3,
                    ..Default::default()
                },
                txs: vec![vec![0xAB; tx_bytes]],
            },
            commit: Commit::empty(),
            tip_commit: None,
        }
    }

    #[test]
    fn test_messages_survive_encoding() {
        let codec = SyncCodec::default();
        for msg in [
            SyncMessage::StatusRequest,
            SyncMessage::StatusResponse { height: 9 },
            SyncMessage::NoBlockResponse { height: 4 },
            response(16),
        ] {
            let bytes = codec.encode(&msg).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = SyncCodec::default();
        assert!(matches!(
            codec.decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(codec.decode(&[]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let codec = SyncCodec::default();
        let mut bytes = codec.encode(&SyncMessage::StatusRequest).unwrap();
        bytes.push(0);
        assert!(codec.decode(&bytes).is_err());
    }

    #[test]
    fn test_size_limit_enforced_both_ways() {
        let codec = SyncCodec::new(1024);
        assert!(matches!(
            codec.encode(&response(2048)),
            Err(CodecError::TooLarge { max: 1024, .. })
        ));

        let big = SyncCodec::default().encode(&response(2048)).unwrap();
        assert!(matches!(
            codec.decode(&big),
            Err(CodecError::TooLarge { max: 1024, .. })
        ));
    }

    #[test]
    fn test_declared_length_beyond_limit_rejected() {
        // BlockResponse tag followed by an absurd chain id length.
        let codec = SyncCodec::new(64);
        let mut bytes = 3u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(codec.decode(&bytes).is_err());
    }
}
