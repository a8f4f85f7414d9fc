//! Error types for the Cirrus core.
//!
//! Every lifecycle and balance failure is a typed variant returned to the
//! caller; nothing in the core panics on bad input, and no transition leaves
//! the system in an intermediate state.

use crate::codec::CodecError;
use cirrus_common::{RentalId, ResourceId, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("rental duration must be at least one hour")]
    InvalidDuration,

    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("duplicate id: {id}")]
    DuplicateId { id: String },

    #[error("not found: {id}")]
    NotFound { id: String },

    #[error("unknown resource: {id}")]
    UnknownResource { id: ResourceId },

    #[error("user {id} is suspended")]
    UserSuspended { id: UserId },

    #[error("resource {id} is not available")]
    ResourceUnavailable { id: ResourceId },

    #[error("rental {id} is already completed")]
    AlreadyCompleted { id: RentalId },

    #[error("rental {id} is not completed")]
    RentalNotCompleted { id: RentalId },

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("credential error: {0}")]
    Credential(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
