//! Shared building blocks for Cirrus components.
//!
//! Keeps the identity newtypes and the logging bootstrap in one place so the
//! core library and the CLI binary agree on both.

pub mod identity;
pub mod logging;

pub use identity::{BillId, RentalId, RequestId, ResourceId, UserId};
