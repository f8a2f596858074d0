//! Domain layer: records, key layout and errors.

pub mod entities;
pub mod errors;
