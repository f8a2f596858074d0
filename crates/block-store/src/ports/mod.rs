//! Port traits: the store API and the dependencies it drives.

pub mod inbound;
pub mod outbound;
