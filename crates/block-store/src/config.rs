//! Block store configuration.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::BlockStoreService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Largest canonical block encoding accepted, in bytes.
    pub max_block_size_bytes: usize,
    /// Verify the stored checksum on every block read.
    pub verify_checksums: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_block_size_bytes: 10 * 1024 * 1024,
            verify_checksums: true,
        }
    }
}

impl StoreConfig {
    /// Small limits for unit tests.
    pub fn for_testing() -> Self {
        Self {
            max_block_size_bytes: 1024 * 1024,
            verify_checksums: true,
        }
    }
}
