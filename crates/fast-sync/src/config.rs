//! # Fast Sync Configuration
//!
//! Durations are stored as milliseconds so the struct round-trips through
//! any serde format; use the accessors to get `Duration`s.

use crate::domain::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fast-sync tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastSyncConfig {
    /// How many heights ahead of the apply point may be requested.
    pub buffer_capacity: u64,

    /// Time a peer has to answer a block request.
    pub request_timeout_ms: u64,

    /// Consecutive timeouts after which a peer is removed.
    pub max_consecutive_timeouts: u32,

    /// Control-loop period while syncing.
    pub tick_interval_ms: u64,

    /// Control-loop period after switching to consensus.
    pub idle_tick_interval_ms: u64,

    /// Period of the own-height broadcast.
    pub status_update_interval_ms: u64,

    /// How long the oldest needed height may stay unassigned before a
    /// liveness warning and a status re-broadcast.
    pub starvation_threshold_ms: u64,

    /// Quiet period (no pending request, no higher peer height) required
    /// before declaring the node caught up.
    pub quiescence_window_ms: u64,

    /// Upper bound on blocks applied in one tick.
    pub max_blocks_per_tick: usize,

    /// Seed for peer tie-breaking; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for FastSyncConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 300,
            request_timeout_ms: 15_000,
            max_consecutive_timeouts: 3,
            tick_interval_ms: 10,
            idle_tick_interval_ms: 1_000,
            status_update_interval_ms: 10_000,
            starvation_threshold_ms: 10_000,
            quiescence_window_ms: 1_000,
            max_blocks_per_tick: 64,
            rng_seed: None,
        }
    }
}

impl FastSyncConfig {
    /// Create a config for testing (short timers, fixed seed).
    pub fn for_testing() -> Self {
        Self {
            buffer_capacity: 64,
            request_timeout_ms: 500,
            max_consecutive_timeouts: 3,
            tick_interval_ms: 5,
            idle_tick_interval_ms: 50,
            status_update_interval_ms: 200,
            starvation_threshold_ms: 300,
            quiescence_window_ms: 100,
            max_blocks_per_tick: 64,
            rng_seed: Some(7),
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        let invalid = |reason: &str| Err(SyncError::InvalidConfig(reason.to_string()));

        if self.buffer_capacity == 0 {
            return invalid("buffer_capacity must be at least 1");
        }
        if self.request_timeout_ms == 0 {
            return invalid("request_timeout_ms must be positive");
        }
        if self.max_consecutive_timeouts == 0 {
            return invalid("max_consecutive_timeouts must be at least 1");
        }
        if self.tick_interval_ms == 0 || self.idle_tick_interval_ms == 0 {
            return invalid("tick intervals must be positive");
        }
        if self.status_update_interval_ms == 0 {
            return invalid("status_update_interval_ms must be positive");
        }
        if self.max_blocks_per_tick == 0 {
            return invalid("max_blocks_per_tick must be at least 1");
        }
        Ok(())
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Tick period while syncing.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Tick period after the hand-off.
    pub fn idle_tick_interval(&self) -> Duration {
        Duration::from_millis(self.idle_tick_interval_ms)
    }

    /// Status broadcast period.
    pub fn status_update_interval(&self) -> Duration {
        Duration::from_millis(self.status_update_interval_ms)
    }

    /// Starvation threshold.
    pub fn starvation_threshold(&self) -> Duration {
        Duration::from_millis(self.starvation_threshold_ms)
    }

    /// Quiescence window.
    pub fn quiescence_window(&self) -> Duration {
        Duration::from_millis(self.quiescence_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FastSyncConfig::default();
        assert_eq!(config.buffer_capacity, 300);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.max_consecutive_timeouts, 3);
        assert_eq!(config.quiescence_window(), Duration::from_secs(1));
        assert!(config.rng_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = FastSyncConfig::for_testing();
        assert_eq!(config.rng_seed, Some(7));
        assert!(config.tick_interval() < FastSyncConfig::default().tick_interval());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = FastSyncConfig {
            buffer_capacity: 0,
            ..FastSyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_quiescence_is_allowed() {
        let config = FastSyncConfig {
            quiescence_window_ms: 0,
            ..FastSyncConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FastSyncConfig =
            serde_json::from_str(r#"{ "buffer_capacity": 10, "rng_seed": 3 }"#).unwrap();
        assert_eq!(config.buffer_capacity, 10);
        assert_eq!(config.rng_seed, Some(3));
        assert_eq!(config.request_timeout_ms, 15_000);
    }
}
