//! Billing rules, bills, and cost computation.
//!
//! Charges are computed at completion time from actual elapsed duration,
//! never from the requested duration. Rate resolution prefers a positive
//! per-resource rate; a zero rate delegates to the kind-level rule, and a
//! missing rule means the rental is free.

use crate::credits::Credits;
use crate::domain::{Resource, ResourceKind, User};
use crate::error::{CoreError, Result};
use crate::rental::RentalRecord;
use crate::store::Collection;
use chrono::{DateTime, Utc};
use cirrus_common::{BillId, RentalId, UserId};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Kind-level default hourly rate. One rule per resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRule {
    pub kind: ResourceKind,
    pub rate_per_hour: Credits,
}

/// An invoice for one completed rental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub rental_id: RentalId,
    pub user_id: UserId,
    pub generated_at: DateTime<Utc>,
    pub amount: Credits,
    pub paid: bool,
}

#[derive(Debug, Default)]
pub struct BillingEngine {
    rules: Collection<BillingRule>,
    bills: Collection<Bill>,
    /// Minimum billable duration in hours; shorter rentals are charged as
    /// if they ran this long.
    min_billing_hours: Option<Decimal>,
}

impl BillingEngine {
    pub fn new(min_billing_hours: Option<Decimal>) -> Self {
        Self {
            rules: Collection::new(),
            bills: Collection::new(),
            min_billing_hours,
        }
    }

    pub fn from_parts(
        rules: Collection<BillingRule>,
        bills: Collection<Bill>,
        min_billing_hours: Option<Decimal>,
    ) -> Self {
        Self {
            rules,
            bills,
            min_billing_hours,
        }
    }

    pub fn rules(&self) -> &Collection<BillingRule> {
        &self.rules
    }

    pub fn bills(&self) -> &Collection<Bill> {
        &self.bills
    }

    /// Set or replace the rule for a resource kind.
    pub fn set_rule(&mut self, kind: ResourceKind, rate_per_hour: Credits) -> Result<()> {
        if rate_per_hour.is_negative() {
            return Err(CoreError::InvalidAmount {
                amount: rate_per_hour.as_decimal(),
            });
        }
        match self.rules.find_mut(&kind.to_string()) {
            Some(rule) => rule.rate_per_hour = rate_per_hour,
            None => self.rules.add(BillingRule {
                kind,
                rate_per_hour,
            })?,
        }
        info!(kind = %kind, rate = %rate_per_hour, "billing rule updated");
        Ok(())
    }

    pub fn rule_for(&self, kind: ResourceKind) -> Option<&BillingRule> {
        self.rules.find(&kind.to_string())
    }

    /// Effective hourly rate for a resource.
    pub fn resolve_rate(&self, resource: &Resource) -> Credits {
        if resource.hourly_rate.is_positive() {
            return resource.hourly_rate;
        }
        self.rule_for(resource.kind())
            .map(|rule| rule.rate_per_hour)
            .unwrap_or_else(Credits::zero)
    }

    /// Cost of running at `rate` from `start` to `end`, prorated to the
    /// elapsed fraction of an hour and floored at the minimum billable
    /// duration when one is configured.
    pub fn compute_cost(
        &self,
        rate: Credits,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Credits {
        let millis = (end - start).num_milliseconds().max(0);
        let mut hours = Decimal::from_f64(millis as f64 / 3_600_000.0).unwrap_or(Decimal::ZERO);
        if let Some(min) = self.min_billing_hours {
            if hours < min {
                hours = min;
            }
        }
        rate.multiply(hours)
    }

    /// Generate the bill for a completed rental. Exactly one bill per
    /// rental; a second call for the same rental is rejected.
    pub fn generate_bill(&mut self, record: &RentalRecord, now: DateTime<Utc>) -> Result<BillId> {
        if record.status != crate::rental::RentalStatus::Completed {
            return Err(CoreError::RentalNotCompleted { id: record.id });
        }
        if self
            .bills
            .iter()
            .any(|bill| bill.rental_id == record.id)
        {
            return Err(CoreError::DuplicateId {
                id: record.id.to_string(),
            });
        }

        let bill = Bill {
            id: BillId::new(),
            rental_id: record.id,
            user_id: record.user_id.clone(),
            generated_at: now,
            amount: record.total_cost,
            paid: false,
        };
        let bill_id = bill.id;
        debug!(bill_id = %bill_id, rental_id = %record.id, amount = %bill.amount, "bill generated");
        self.bills.add(bill)?;
        Ok(bill_id)
    }

    /// Settle a bill against the user's balance. Paying an already-paid
    /// bill is a no-op. On insufficient funds nothing changes.
    pub fn pay(&mut self, bill_id: BillId, user: &mut User, allow_overdraft: bool) -> Result<()> {
        let bill = self
            .bills
            .find_mut(&bill_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: bill_id.to_string(),
            })?;
        if bill.paid {
            return Ok(());
        }

        if allow_overdraft {
            user.withdraw_with_overdraft(bill.amount)?;
        } else {
            user.withdraw(bill.amount)?;
        }
        bill.paid = true;
        info!(bill_id = %bill_id, user_id = %user.id, amount = %bill.amount, "bill paid");
        Ok(())
    }

    pub fn bill(&self, bill_id: BillId) -> Option<&Bill> {
        self.bills.find(&bill_id.to_string())
    }

    pub fn bills_for(&self, user_id: &UserId) -> Vec<&Bill> {
        self.bills.filter(|bill| &bill.user_id == user_id)
    }

    pub fn unpaid_for(&self, user_id: &UserId) -> Vec<&Bill> {
        self.bills
            .filter(|bill| &bill.user_id == user_id && !bill.paid)
    }
}
