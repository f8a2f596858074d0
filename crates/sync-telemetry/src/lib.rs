//! # Sync Telemetry
//!
//! Structured logging setup for processes embedding the fast-sync engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sync_telemetry::{init_logging, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FS_LOG_LEVEL` / `RUST_LOG` | `info` | `EnvFilter` directive |
//! | `FS_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `FS_LOG_TARGETS` | `true` | Include the event target |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The filter directive does not parse.
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// Directive as given
        directive: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    SubscriberInit(String),
}
