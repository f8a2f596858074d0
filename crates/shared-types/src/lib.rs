//! # Shared Types Crate
//!
//! Chain entities exchanged between the block store, the sync engine and
//! its peers.
//!
//! ## Design Principles
//!
//! - **Canonical hashing**: every hash is computed over a fixed byte layout
//!   built here, never over a serializer's output.
//! - **Commit binding**: block `N` is finalized by a [`Commit`] whose hash is
//!   recorded in block `N+1`'s `last_commit_hash`.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
