//! # Fast-Sync Test Suite
//!
//! End-to-end scenarios: several nodes, each running a `SyncReactor` on
//! its own task, wired together by a `MemoryNetwork`.

pub mod integration;
