//! # Fast Sync Metrics
//!
//! Prometheus metrics for monitoring catch-up progress.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! fast-sync = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `fastsync_blocks_applied_total` - Counter of applied blocks
//! - `fastsync_peers_evicted_total` - Counter of evicted peers (by reason)
//! - `fastsync_sync_height` - Next height to acquire
//! - `fastsync_max_peer_height` - Highest height announced by a known peer
//! - `fastsync_pending_requests` - Outstanding block requests

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total blocks applied and stored
    pub static ref BLOCKS_APPLIED: IntCounter = register_int_counter!(
        "fastsync_blocks_applied_total",
        "Total number of blocks applied by fast sync"
    )
    .expect("Failed to create BLOCKS_APPLIED metric");

    /// Total peers evicted, labeled by reason
    pub static ref PEERS_EVICTED: IntCounterVec = register_int_counter_vec!(
        "fastsync_peers_evicted_total",
        "Total number of peers evicted by fast sync",
        &["reason"]
    )
    .expect("Failed to create PEERS_EVICTED metric");

    /// Next height to acquire
    pub static ref SYNC_HEIGHT: IntGauge = register_int_gauge!(
        "fastsync_sync_height",
        "Next block height fast sync needs"
    )
    .expect("Failed to create SYNC_HEIGHT metric");

    /// Highest height announced by a known peer
    pub static ref MAX_PEER_HEIGHT: IntGauge = register_int_gauge!(
        "fastsync_max_peer_height",
        "Maximum height announced by a known peer"
    )
    .expect("Failed to create MAX_PEER_HEIGHT metric");

    /// Outstanding block requests
    pub static ref PENDING_REQUESTS: IntGauge = register_int_gauge!(
        "fastsync_pending_requests",
        "Number of outstanding block requests"
    )
    .expect("Failed to create PENDING_REQUESTS metric");
}

/// Record an applied block
#[cfg(feature = "metrics")]
pub fn record_block_applied() {
    BLOCKS_APPLIED.inc();
}

/// Record a peer eviction with reason
#[cfg(feature = "metrics")]
pub fn record_peer_evicted(reason: &str) {
    PEERS_EVICTED.with_label_values(&[reason]).inc();
}

/// Publish pool progress gauges
#[cfg(feature = "metrics")]
pub fn set_progress(sync_height: u64, max_peer_height: u64, pending: usize) {
    SYNC_HEIGHT.set(i64::try_from(sync_height).unwrap_or(i64::MAX));
    MAX_PEER_HEIGHT.set(i64::try_from(max_peer_height).unwrap_or(i64::MAX));
    PENDING_REQUESTS.set(i64::try_from(pending).unwrap_or(i64::MAX));
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_block_applied() {}

#[cfg(not(feature = "metrics"))]
pub fn record_peer_evicted(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_progress(_sync_height: u64, _max_peer_height: u64, _pending: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_callable_with_or_without_feature() {
        record_block_applied();
        record_peer_evicted("timeout");
        set_progress(10, 20, 3);
    }
}
