//! Rental requests and rental records.
//!
//! A request travels `PendingApproval -> {Approved, Rejected, Cancelled,
//! Expired}` and is immutable once it leaves `PendingApproval`. Approval
//! allocates the resource and opens an `Active` record, which later moves to
//! `Completed` (billed) or `Cancelled` (freed without charge). The guards
//! here only validate transitions; the orchestration that keeps resource
//! status and records in agreement lives in the service layer.

use crate::credits::Credits;
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use cirrus_common::{RentalId, RequestId, ResourceId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingApproval,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl RequestStatus {
    /// Terminal for the request itself; `Approved` is terminal because the
    /// lifecycle continues on the rental record it spawned.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::PendingApproval)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::PendingApproval, RequestStatus::Approved)
                | (RequestStatus::PendingApproval, RequestStatus::Rejected)
                | (RequestStatus::PendingApproval, RequestStatus::Cancelled)
                | (RequestStatus::PendingApproval, RequestStatus::Expired)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::PendingApproval => write!(f, "pending approval"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
            RequestStatus::Cancelled => write!(f, "cancelled"),
            RequestStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Completed,
    Cancelled,
}

impl RentalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Completed | RentalStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!(
            (self, next),
            (RentalStatus::Active, RentalStatus::Completed)
                | (RentalStatus::Active, RentalStatus::Cancelled)
        )
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RentalStatus::Active => write!(f, "active"),
            RentalStatus::Completed => write!(f, "completed"),
            RentalStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A user's request to rent a resource, awaiting an admin decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub resource_id: ResourceId,
    pub requested_at: DateTime<Utc>,
    pub desired_start: DateTime<Utc>,
    pub duration_hours: u32,
    pub status: RequestStatus,
    pub admin_notes: String,
}

impl RentalRequest {
    pub fn new(
        user_id: UserId,
        resource_id: ResourceId,
        desired_start: DateTime<Utc>,
        duration_hours: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            user_id,
            resource_id,
            requested_at: now,
            desired_start,
            duration_hours,
            status: RequestStatus::PendingApproval,
            admin_notes: String::new(),
        }
    }

    pub fn transition_to(&mut self, next: RequestStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

/// An allocated rental: opened at approval, closed at completion or
/// cancellation. Completed records are history and never mutated again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRecord {
    pub id: RentalId,
    pub request_id: RequestId,
    pub user_id: UserId,
    pub resource_id: ResourceId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_cost: Credits,
    pub status: RentalStatus,
}

impl RentalRecord {
    /// Open an active record for an approved request. The start instant is
    /// the approval instant: cost accrues from allocation.
    pub fn open(request: &RentalRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RentalId::new(),
            request_id: request.id,
            user_id: request.user_id.clone(),
            resource_id: request.resource_id.clone(),
            started_at: now,
            ended_at: None,
            total_cost: Credits::zero(),
            status: RentalStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }

    pub fn transition_to(&mut self, next: RentalStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Close the record as completed, fixing end time and total cost in one
    /// step.
    pub fn finish(&mut self, ended_at: DateTime<Utc>, total_cost: Credits) -> Result<()> {
        self.transition_to(RentalStatus::Completed)?;
        self.ended_at = Some(ended_at);
        self.total_cost = total_cost;
        Ok(())
    }

    /// Close the record as cancelled; no cost accrues.
    pub fn cancel(&mut self, ended_at: DateTime<Utc>) -> Result<()> {
        self.transition_to(RentalStatus::Cancelled)?;
        self.ended_at = Some(ended_at);
        Ok(())
    }
}
