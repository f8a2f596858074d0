//! # Error Types
//!
//! Errors raised while constructing shared entities.

use thiserror::Error;

/// Errors building a [`crate::ValidatorSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A validator set must contain at least one validator.
    #[error("Validator set is empty")]
    EmptyValidatorSet,

    /// The same address appears twice.
    #[error("Duplicate validator: {address}")]
    DuplicateValidator {
        /// Hex-encoded address
        address: String,
    },

    /// Validators with no voting power are not allowed in a set.
    #[error("Validator {address} has zero voting power")]
    ZeroVotingPower {
        /// Hex-encoded address
        address: String,
    },

    /// Total voting power does not fit in a u64.
    #[error("Total voting power overflows")]
    VotingPowerOverflow,
}
