//! Application layer: the reactor and the pipeline it drives.

pub mod pipeline;
pub mod reactor;

pub use pipeline::{DrainReport, VerifyApplyPipeline};
pub use reactor::{SyncPorts, SyncReactor};
