//! Cirrus core: campus cloud resource rental and billing.
//!
//! Entities (resources, users, requests, rentals, bills, notifications)
//! live in typed in-memory collections backed by flat-file snapshots with a
//! self-describing binary codec. [`CirrusService`] is the single entry point
//! for every operation: registration, the request/approve/complete rental
//! lifecycle, billing, and notifications.

pub mod auth;
pub mod billing;
pub mod codec;
pub mod config;
pub mod credits;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod rental;
pub mod service;
pub mod store;

pub use billing::{Bill, BillingRule};
pub use config::CoreConfig;
pub use credits::Credits;
pub use domain::{Hardware, Resource, ResourceKind, ResourceStatus, Role, User, UserStatus};
pub use error::{CoreError, Result};
pub use notify::{Notification, Notifier, Priority};
pub use rental::{RentalRecord, RentalRequest, RentalStatus, RequestStatus};
pub use service::CirrusService;
