//! Multi-node fast-sync scenarios.

pub mod harness;

mod bad_peer;
mod catch_up;
mod liveness;
