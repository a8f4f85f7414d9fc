//! The Cirrus service: one owner for all state, one entry point per
//! operation.
//!
//! Every public operation validates first and mutates second, so a failed
//! call leaves users, resources, requests and rentals exactly as they were.
//! Operations that depend on the clock take it as a parameter in their
//! `_at` form; the plain form passes `Utc::now()`.

use crate::billing::{Bill, BillingEngine, BillingRule};
use crate::config::CoreConfig;
use crate::credits::Credits;
use crate::domain::{
    Hardware, Resource, ResourceKind, ResourceStatus, Role, User, UserStatus,
};
use crate::error::{CoreError, Result};
use crate::notify::{Notification, NotificationLog, Notifier, Priority};
use crate::persistence::{
    DataStore, BILLS_FILE, LOGS_FILE, RENTALS_FILE, REQUESTS_FILE, RESOURCES_FILE, RULES_FILE,
    USERS_FILE,
};
use crate::rental::{RentalRecord, RentalRequest, RentalStatus, RequestStatus};
use crate::store::Collection;
use crate::auth;
use chrono::{DateTime, Utc};
use cirrus_common::{BillId, RentalId, RequestId, ResourceId, UserId};
use tracing::{info, warn};
use uuid::Uuid;

pub struct CirrusService {
    users: Collection<User>,
    resources: Collection<Resource>,
    requests: Collection<RentalRequest>,
    rentals: Collection<RentalRecord>,
    billing: BillingEngine,
    notifications: NotificationLog,
    config: CoreConfig,
    store: DataStore,
}

impl CirrusService {
    /// Start with empty state under the configured data directory.
    pub fn new(config: CoreConfig) -> Self {
        let store = DataStore::new(&config.data_dir);
        let billing = BillingEngine::new(config.min_billing_decimal());
        Self {
            users: Collection::new(),
            resources: Collection::new(),
            requests: Collection::new(),
            rentals: Collection::new(),
            billing,
            notifications: NotificationLog::new(),
            config,
            store,
        }
    }

    /// Load all persisted families from the data directory. Families whose
    /// snapshot is missing or unreadable start empty.
    pub fn load(config: CoreConfig) -> Self {
        let store = DataStore::new(&config.data_dir);
        let billing = BillingEngine::from_parts(
            store.load_or_default(RULES_FILE),
            store.load_or_default(BILLS_FILE),
            config.min_billing_decimal(),
        );
        Self {
            users: store.load_or_default(USERS_FILE),
            resources: store.load_or_default(RESOURCES_FILE),
            requests: store.load_or_default(REQUESTS_FILE),
            rentals: store.load_or_default(RENTALS_FILE),
            billing,
            notifications: NotificationLog::from_collection(store.load_or_default(LOGS_FILE)),
            config,
            store,
        }
    }

    /// Persist every family. Each file is replaced atomically.
    pub fn save(&self) -> Result<()> {
        self.store.save(USERS_FILE, &self.users)?;
        self.store.save(RESOURCES_FILE, &self.resources)?;
        self.store.save(REQUESTS_FILE, &self.requests)?;
        self.store.save(RENTALS_FILE, &self.rentals)?;
        self.store.save(BILLS_FILE, self.billing.bills())?;
        self.store.save(RULES_FILE, self.billing.rules())?;
        self.store.save(LOGS_FILE, self.notifications.entries())?;
        info!(data_dir = %self.store.root().display(), "state saved");
        Ok(())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Seed the bootstrap accounts and sample inventory into an empty
    /// system. Does nothing when users already exist.
    pub fn seed_defaults(&mut self) -> Result<()> {
        if !self.users.is_empty() {
            return Ok(());
        }
        info!("seeding default accounts and inventory");

        let admin = User::new(
            UserId::new("admin001"),
            "admin",
            auth::hash_password("admin123")?,
            Role::Admin,
        );
        self.users.add(admin)?;

        let mut teacher = User::new(
            UserId::new("teacher001"),
            "teacher",
            auth::hash_password("teacher123")?,
            Role::Teacher,
        );
        teacher.deposit(Credits::from_decimal(1000.into()))?;
        self.users.add(teacher)?;

        let mut student = User::new(
            UserId::new("student001"),
            "student",
            auth::hash_password("student123")?,
            Role::Student,
        );
        student.deposit(Credits::from_decimal(100.into()))?;
        self.users.add(student)?;

        if self.resources.is_empty() {
            let inventory = [
                Resource::new(
                    ResourceId::new("CPU001"),
                    "Intel Xeon Platinum 8380",
                    Credits::from_decimal(4.into()),
                    512,
                    Hardware::Cpu {
                        cores: 40,
                        clock_ghz: 2.3,
                    },
                ),
                Resource::new(
                    ResourceId::new("CPU002"),
                    "AMD EPYC 7763",
                    Credits::from_decimal(rust_decimal::Decimal::new(35, 1)),
                    256,
                    Hardware::Cpu {
                        cores: 64,
                        clock_ghz: 2.45,
                    },
                ),
                Resource::new(
                    ResourceId::new("GPU001"),
                    "NVIDIA H100 80GB",
                    Credits::from_decimal(10.into()),
                    2048,
                    Hardware::Gpu {
                        parallel_cores: 16896,
                        vram_gb: 80,
                    },
                ),
                Resource::new(
                    ResourceId::new("GPU002"),
                    "NVIDIA A100 40GB",
                    Credits::from_decimal(6.into()),
                    1024,
                    Hardware::Gpu {
                        parallel_cores: 6912,
                        vram_gb: 40,
                    },
                ),
            ];
            for resource in inventory {
                self.resources.add(resource)?;
            }
        }
        Ok(())
    }

    // ---- users ----

    /// Register a new account. Usernames are unique; the id is derived from
    /// the role ("student002", "teacher003", ...).
    pub fn register_user(&mut self, username: &str, password: &str, role: Role) -> Result<UserId> {
        if self.users.iter().any(|u| u.username == username) {
            return Err(CoreError::DuplicateId {
                id: username.to_string(),
            });
        }
        let id = self.next_user_id(role);
        let user = User::new(id.clone(), username, auth::hash_password(password)?, role);
        self.users.add(user)?;
        info!(user_id = %id, role = %role, "user registered");
        Ok(id)
    }

    fn next_user_id(&self, role: Role) -> UserId {
        let mut n = self.users.iter().filter(|u| u.role == role).count() + 1;
        loop {
            let candidate = UserId::new(format!("{role}{n:03}"));
            if !self.users.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Check a username/password pair. Returns the matching user, or `None`
    /// for an unknown name or wrong password, indistinguishably.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        let user = self.users.iter().find(|u| u.username == username)?;
        if user.verify_password(password) {
            Some(user)
        } else {
            warn!(username, "failed login attempt");
            None
        }
    }

    pub fn user(&self, user_id: &UserId) -> Option<&User> {
        self.users.find(user_id.as_str())
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    pub fn set_user_status(&mut self, user_id: &UserId, status: UserStatus) -> Result<()> {
        let user = self.find_user_mut(user_id)?;
        user.status = status;
        info!(user_id = %user_id, status = %status, "user status changed");
        Ok(())
    }

    pub fn deposit(&mut self, user_id: &UserId, amount: Credits) -> Result<()> {
        self.find_user_mut(user_id)?.deposit(amount)
    }

    pub fn withdraw(&mut self, user_id: &UserId, amount: Credits) -> Result<()> {
        self.find_user_mut(user_id)?.withdraw(amount)
    }

    fn find_user_mut(&mut self, user_id: &UserId) -> Result<&mut User> {
        self.users
            .find_mut(user_id.as_str())
            .ok_or_else(|| CoreError::NotFound {
                id: user_id.to_string(),
            })
    }

    // ---- resources ----

    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        info!(resource_id = %resource.id, kind = %resource.kind(), "resource added");
        self.resources.add(resource)
    }

    /// Remove a resource from inventory. Refused while a rental holds it.
    pub fn remove_resource(&mut self, resource_id: &ResourceId) -> Result<Resource> {
        let resource = self.find_resource(resource_id)?;
        if resource.status == ResourceStatus::InUse {
            return Err(CoreError::ResourceUnavailable {
                id: resource_id.clone(),
            });
        }
        self.resources.remove(resource_id.as_str())
    }

    pub fn set_resource_rate(&mut self, resource_id: &ResourceId, rate: Credits) -> Result<()> {
        if rate.is_negative() {
            return Err(CoreError::InvalidAmount {
                amount: rate.as_decimal(),
            });
        }
        let resource = self
            .resources
            .find_mut(resource_id.as_str())
            .ok_or_else(|| CoreError::UnknownResource {
                id: resource_id.clone(),
            })?;
        resource.hourly_rate = rate;
        Ok(())
    }

    pub fn resource(&self, resource_id: &ResourceId) -> Option<&Resource> {
        self.resources.find(resource_id.as_str())
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn available_resources(&self) -> Vec<&Resource> {
        self.resources.filter(|r| r.is_available())
    }

    fn find_resource(&self, resource_id: &ResourceId) -> Result<&Resource> {
        self.resources
            .find(resource_id.as_str())
            .ok_or_else(|| CoreError::UnknownResource {
                id: resource_id.clone(),
            })
    }

    // ---- rental lifecycle ----

    pub fn create_request(
        &mut self,
        user_id: &UserId,
        resource_id: &ResourceId,
        desired_start: DateTime<Utc>,
        duration_hours: u32,
    ) -> Result<RequestId> {
        self.create_request_at(user_id, resource_id, desired_start, duration_hours, Utc::now())
    }

    /// File a rental request for admin review.
    pub fn create_request_at(
        &mut self,
        user_id: &UserId,
        resource_id: &ResourceId,
        desired_start: DateTime<Utc>,
        duration_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<RequestId> {
        let user = self.user(user_id).ok_or_else(|| CoreError::NotFound {
            id: user_id.to_string(),
        })?;
        if !user.is_active() {
            return Err(CoreError::UserSuspended {
                id: user_id.clone(),
            });
        }
        self.find_resource(resource_id)?;
        if duration_hours == 0 {
            return Err(CoreError::InvalidDuration);
        }

        let request = RentalRequest::new(
            user_id.clone(),
            resource_id.clone(),
            desired_start,
            duration_hours,
            now,
        );
        let request_id = request.id;
        self.requests.add(request)?;
        info!(request_id = %request_id, user_id = %user_id, resource_id = %resource_id, "rental request filed");
        Ok(request_id)
    }

    pub fn approve_request(&mut self, request_id: RequestId, notes: &str) -> Result<RentalId> {
        self.approve_request_at(request_id, notes, Utc::now())
    }

    /// Approve a pending request: allocate the resource and open an active
    /// rental. Fails without side effects when the request is not pending,
    /// the requester has been suspended, or the resource is already held.
    pub fn approve_request_at(
        &mut self,
        request_id: RequestId,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<RentalId> {
        let request = self.find_request(request_id)?;
        if !request.status.can_transition_to(RequestStatus::Approved) {
            return Err(CoreError::InvalidTransition {
                from: request.status.to_string(),
                to: RequestStatus::Approved.to_string(),
            });
        }
        let user_id = request.user_id.clone();
        let resource_id = request.resource_id.clone();

        let user = self.user(&user_id).ok_or_else(|| CoreError::NotFound {
            id: user_id.to_string(),
        })?;
        if !user.is_active() {
            return Err(CoreError::UserSuspended { id: user_id });
        }
        let resource = self.find_resource(&resource_id)?;
        if !resource.is_available() {
            return Err(CoreError::ResourceUnavailable { id: resource_id });
        }

        // All checks passed; from here every step must succeed.
        let request = self
            .requests
            .find_mut(&request_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: request_id.to_string(),
            })?;
        request.transition_to(RequestStatus::Approved)?;
        request.admin_notes = notes.to_string();
        let record = RentalRecord::open(request, now);
        let rental_id = record.id;

        if let Some(resource) = self.resources.find_mut(resource_id.as_str()) {
            resource.status = ResourceStatus::InUse;
        }
        self.rentals.add(record)?;
        self.notifications.notify(
            &user_id,
            &format!("Your request for {resource_id} was approved"),
            Priority::Medium,
            now,
        );
        info!(request_id = %request_id, rental_id = %rental_id, "request approved");
        Ok(rental_id)
    }

    pub fn reject_request(
        &mut self,
        request_id: RequestId,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let request = self.find_request_mut(request_id)?;
        request.transition_to(RequestStatus::Rejected)?;
        request.admin_notes = notes.to_string();
        let user_id = request.user_id.clone();
        let resource_id = request.resource_id.clone();
        self.notifications.notify(
            &user_id,
            &format!("Your request for {resource_id} was rejected"),
            Priority::Medium,
            now,
        );
        info!(request_id = %request_id, "request rejected");
        Ok(())
    }

    /// Withdraw a pending request. Only the requester's own pending
    /// requests can be cancelled; an approved request is cancelled through
    /// its rental instead.
    pub fn cancel_request(&mut self, request_id: RequestId) -> Result<()> {
        let request = self.find_request_mut(request_id)?;
        request.transition_to(RequestStatus::Cancelled)?;
        info!(request_id = %request_id, "request cancelled");
        Ok(())
    }

    /// Expire every pending request whose desired start has passed.
    /// Returns how many were expired.
    pub fn expire_pending_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        let notifications = &mut self.notifications;
        for request in self.requests.iter_mut() {
            if request.status == RequestStatus::PendingApproval && request.desired_start < now {
                request.status = RequestStatus::Expired;
                notifications.notify(
                    &request.user_id,
                    &format!("Your request for {} expired before review", request.resource_id),
                    Priority::Low,
                    now,
                );
                expired += 1;
            }
        }
        if expired > 0 {
            info!(count = expired, "expired stale pending requests");
        }
        expired
    }

    pub fn cancel_rental(&mut self, rental_id: RentalId) -> Result<()> {
        self.cancel_rental_at(rental_id, Utc::now())
    }

    /// Cancel an active rental: the record closes without charge and the
    /// resource returns to the pool.
    pub fn cancel_rental_at(&mut self, rental_id: RentalId, now: DateTime<Utc>) -> Result<()> {
        let record = self.find_rental_mut(rental_id)?;
        record.cancel(now)?;
        let resource_id = record.resource_id.clone();
        let user_id = record.user_id.clone();
        if let Some(resource) = self.resources.find_mut(resource_id.as_str()) {
            resource.status = ResourceStatus::Idle;
        }
        self.notifications.notify(
            &user_id,
            &format!("Rental of {resource_id} was cancelled; no charge"),
            Priority::Low,
            now,
        );
        info!(rental_id = %rental_id, "rental cancelled");
        Ok(())
    }

    pub fn complete_rental(&mut self, rental_id: RentalId) -> Result<BillId> {
        self.complete_rental_at(rental_id, Utc::now())
    }

    /// Complete an active rental: charge for actual elapsed time, free the
    /// resource, and generate the bill. Completing twice is an error and
    /// changes nothing.
    pub fn complete_rental_at(&mut self, rental_id: RentalId, now: DateTime<Utc>) -> Result<BillId> {
        let record = self
            .rentals
            .find(&rental_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: rental_id.to_string(),
            })?;
        match record.status {
            RentalStatus::Completed => return Err(CoreError::AlreadyCompleted { id: rental_id }),
            RentalStatus::Cancelled => {
                return Err(CoreError::InvalidTransition {
                    from: record.status.to_string(),
                    to: RentalStatus::Completed.to_string(),
                })
            }
            RentalStatus::Active => {}
        }
        let user_id = record.user_id.clone();
        let resource_id = record.resource_id.clone();
        let started_at = record.started_at;

        let resource = self.find_resource(&resource_id)?;
        let rate = self.billing.resolve_rate(resource);
        let cost = self.billing.compute_cost(rate, started_at, now);

        let record = self
            .rentals
            .find_mut(&rental_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: rental_id.to_string(),
            })?;
        record.finish(now, cost)?;
        let snapshot = record.clone();

        if let Some(resource) = self.resources.find_mut(resource_id.as_str()) {
            resource.status = ResourceStatus::Idle;
        }
        let bill_id = self.billing.generate_bill(&snapshot, now)?;
        self.notifications.notify(
            &user_id,
            &format!("Rental of {resource_id} completed; billed {cost} credits"),
            Priority::Medium,
            now,
        );
        info!(rental_id = %rental_id, bill_id = %bill_id, cost = %cost, "rental completed");
        Ok(bill_id)
    }

    pub fn pay_bill(&mut self, bill_id: BillId) -> Result<()> {
        self.pay_bill_at(bill_id, Utc::now())
    }

    /// Settle a bill from the owing user's balance. On insufficient funds
    /// the balance and the bill are untouched and the user is alerted.
    pub fn pay_bill_at(&mut self, bill_id: BillId, now: DateTime<Utc>) -> Result<()> {
        let user_id = self
            .billing
            .bill(bill_id)
            .map(|bill| bill.user_id.clone())
            .ok_or_else(|| CoreError::NotFound {
                id: bill_id.to_string(),
            })?;
        let allow_overdraft = self.config.overdraft_allowed;
        let user = self
            .users
            .find_mut(user_id.as_str())
            .ok_or_else(|| CoreError::NotFound {
                id: user_id.to_string(),
            })?;
        match self.billing.pay(bill_id, user, allow_overdraft) {
            Ok(()) => Ok(()),
            Err(err @ CoreError::InsufficientFunds { .. }) => {
                self.notifications.notify(
                    &user_id,
                    "Bill payment failed: insufficient funds",
                    Priority::High,
                    now,
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    // ---- queries ----

    fn find_request(&self, request_id: RequestId) -> Result<&RentalRequest> {
        self.requests
            .find(&request_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: request_id.to_string(),
            })
    }

    fn find_request_mut(&mut self, request_id: RequestId) -> Result<&mut RentalRequest> {
        self.requests
            .find_mut(&request_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: request_id.to_string(),
            })
    }

    fn find_rental_mut(&mut self, rental_id: RentalId) -> Result<&mut RentalRecord> {
        self.rentals
            .find_mut(&rental_id.to_string())
            .ok_or_else(|| CoreError::NotFound {
                id: rental_id.to_string(),
            })
    }

    pub fn request(&self, request_id: RequestId) -> Option<&RentalRequest> {
        self.requests.find(&request_id.to_string())
    }

    pub fn rental(&self, rental_id: RentalId) -> Option<&RentalRecord> {
        self.rentals.find(&rental_id.to_string())
    }

    pub fn pending_requests(&self) -> Vec<&RentalRequest> {
        self.requests
            .filter(|r| r.status == RequestStatus::PendingApproval)
    }

    pub fn user_requests(&self, user_id: &UserId) -> Vec<&RentalRequest> {
        self.requests.filter(|r| &r.user_id == user_id)
    }

    pub fn user_rentals(&self, user_id: &UserId) -> Vec<&RentalRecord> {
        self.rentals.filter(|r| &r.user_id == user_id)
    }

    pub fn active_rentals(&self) -> Vec<&RentalRecord> {
        self.rentals.filter(|r| r.is_active())
    }

    pub fn bill(&self, bill_id: BillId) -> Option<&Bill> {
        self.billing.bill(bill_id)
    }

    pub fn user_bills(&self, user_id: &UserId) -> Vec<&Bill> {
        self.billing.bills_for(user_id)
    }

    pub fn unpaid_bills(&self, user_id: &UserId) -> Vec<&Bill> {
        self.billing.unpaid_for(user_id)
    }

    pub fn all_bills(&self) -> impl Iterator<Item = &Bill> {
        self.billing.bills().iter()
    }

    pub fn billing_rules(&self) -> impl Iterator<Item = &BillingRule> {
        self.billing.rules().iter()
    }

    pub fn set_billing_rule(&mut self, kind: ResourceKind, rate: Credits) -> Result<()> {
        self.billing.set_rule(kind, rate)
    }

    pub fn unread_notifications(&self, user_id: &UserId) -> Vec<&Notification> {
        self.notifications.unread_for(user_id)
    }

    pub fn mark_notification_read(&mut self, id: Uuid) -> bool {
        self.notifications.mark_read(id)
    }

    pub fn mark_all_notifications_read(&mut self, user_id: &UserId) -> usize {
        self.notifications.mark_all_read(user_id)
    }

    pub fn clear_read_notifications(&mut self, user_id: &UserId) -> usize {
        self.notifications.clear_read(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn service() -> CirrusService {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig {
            data_dir: dir.path().join("data"),
            ..CoreConfig::default()
        };
        // The tempdir guard is dropped; these tests never touch disk.
        let mut svc = CirrusService::new(config);
        svc.add_resource(Resource::new(
            ResourceId::new("CPU001"),
            "Intel Xeon Platinum 8380",
            Credits::from_f64(4.0).unwrap(),
            512,
            Hardware::Cpu {
                cores: 40,
                clock_ghz: 2.3,
            },
        ))
        .unwrap();
        svc
    }

    fn registered_user(svc: &mut CirrusService, balance: f64) -> UserId {
        let id = svc
            .register_user("alice", "password1", Role::Student)
            .unwrap();
        svc.deposit(&id, Credits::from_f64(balance).unwrap())
            .unwrap();
        id
    }

    fn approved_rental(svc: &mut CirrusService, user_id: &UserId, now: DateTime<Utc>) -> RentalId {
        let request_id = svc
            .create_request_at(user_id, &ResourceId::new("CPU001"), now, 3, now)
            .unwrap();
        svc.approve_request_at(request_id, "ok", now).unwrap()
    }

    #[test]
    fn full_lifecycle_bills_exact_elapsed_cost() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();

        let rental_id = approved_rental(&mut svc, &user_id, now);
        assert!(!svc
            .resource(&ResourceId::new("CPU001"))
            .unwrap()
            .is_available());

        let bill_id = svc
            .complete_rental_at(rental_id, now + Duration::hours(3))
            .unwrap();
        let bill = svc.bill(bill_id).unwrap();
        assert_eq!(bill.amount.as_decimal(), dec!(12));
        assert!(svc
            .resource(&ResourceId::new("CPU001"))
            .unwrap()
            .is_available());

        svc.pay_bill_at(bill_id, now + Duration::hours(3)).unwrap();
        assert_eq!(svc.user(&user_id).unwrap().balance.as_decimal(), dec!(88));
        assert!(svc.bill(bill_id).unwrap().paid);
    }

    #[test]
    fn charge_follows_actual_duration_not_requested() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();

        // Requested three hours, returned after one.
        let rental_id = approved_rental(&mut svc, &user_id, now);
        let bill_id = svc
            .complete_rental_at(rental_id, now + Duration::hours(1))
            .unwrap();
        assert_eq!(svc.bill(bill_id).unwrap().amount.as_decimal(), dec!(4));
    }

    #[test]
    fn second_approval_for_held_resource_is_refused() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        approved_rental(&mut svc, &user_id, now);

        let other = svc.register_user("bob", "password2", Role::Teacher).unwrap();
        let second = svc
            .create_request_at(&other, &ResourceId::new("CPU001"), now, 2, now)
            .unwrap();
        let err = svc.approve_request_at(second, "", now).unwrap_err();
        assert!(matches!(err, CoreError::ResourceUnavailable { .. }));
        // The request is still pending and can be approved later.
        assert_eq!(
            svc.request(second).unwrap().status,
            RequestStatus::PendingApproval
        );
    }

    #[test]
    fn double_completion_is_rejected_without_change() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        let rental_id = approved_rental(&mut svc, &user_id, now);

        svc.complete_rental_at(rental_id, now + Duration::hours(3))
            .unwrap();
        let err = svc
            .complete_rental_at(rental_id, now + Duration::hours(5))
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyCompleted { .. }));

        // Still exactly one bill, for the first completion's amount.
        let bills = svc.user_bills(&user_id);
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].amount.as_decimal(), dec!(12));
    }

    #[test]
    fn suspended_user_cannot_request() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        svc.set_user_status(&user_id, UserStatus::Suspended).unwrap();

        let now = Utc::now();
        let err = svc
            .create_request_at(&user_id, &ResourceId::new("CPU001"), now, 2, now)
            .unwrap_err();
        assert!(matches!(err, CoreError::UserSuspended { .. }));
    }

    #[test]
    fn zero_duration_request_is_invalid() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        let err = svc
            .create_request_at(&user_id, &ResourceId::new("CPU001"), now, 0, now)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDuration));
    }

    #[test]
    fn unknown_resource_is_reported() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        let err = svc
            .create_request_at(&user_id, &ResourceId::new("TPU001"), now, 2, now)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownResource { .. }));
    }

    #[test]
    fn stale_pending_requests_expire() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();

        let request_id = svc
            .create_request_at(
                &user_id,
                &ResourceId::new("CPU001"),
                now + Duration::hours(1),
                2,
                now,
            )
            .unwrap();

        assert_eq!(svc.expire_pending_at(now), 0);
        assert_eq!(svc.expire_pending_at(now + Duration::hours(2)), 1);
        assert_eq!(
            svc.request(request_id).unwrap().status,
            RequestStatus::Expired
        );
        assert_eq!(svc.unread_notifications(&user_id).len(), 1);

        let err = svc
            .approve_request_at(request_id, "", now + Duration::hours(3))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn cancelled_rental_frees_resource_without_charge() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        let rental_id = approved_rental(&mut svc, &user_id, now);

        svc.cancel_rental_at(rental_id, now + Duration::hours(1))
            .unwrap();
        assert!(svc
            .resource(&ResourceId::new("CPU001"))
            .unwrap()
            .is_available());
        assert!(svc.user_bills(&user_id).is_empty());
        assert_eq!(svc.user(&user_id).unwrap().balance.as_decimal(), dec!(100));
    }

    #[test]
    fn failed_payment_raises_high_priority_alert() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 10.0);
        let now = Utc::now();
        let rental_id = approved_rental(&mut svc, &user_id, now);
        let bill_id = svc
            .complete_rental_at(rental_id, now + Duration::hours(3))
            .unwrap();

        let err = svc.pay_bill_at(bill_id, now).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        assert_eq!(svc.user(&user_id).unwrap().balance.as_decimal(), dec!(10));
        assert!(!svc.bill(bill_id).unwrap().paid);
        assert!(svc
            .unread_notifications(&user_id)
            .iter()
            .any(|n| n.priority == Priority::High));
    }

    #[test]
    fn resource_in_use_iff_exactly_one_active_rental() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        let rental_id = approved_rental(&mut svc, &user_id, now);

        let holders = svc
            .active_rentals()
            .iter()
            .filter(|r| r.resource_id.as_str() == "CPU001")
            .count();
        assert_eq!(holders, 1);

        svc.complete_rental_at(rental_id, now + Duration::hours(1))
            .unwrap();
        assert!(svc.active_rentals().is_empty());
        assert!(svc
            .resource(&ResourceId::new("CPU001"))
            .unwrap()
            .is_available());
    }

    #[test]
    fn in_use_resource_cannot_be_removed() {
        let mut svc = service();
        let user_id = registered_user(&mut svc, 100.0);
        let now = Utc::now();
        approved_rental(&mut svc, &user_id, now);

        let err = svc.remove_resource(&ResourceId::new("CPU001")).unwrap_err();
        assert!(matches!(err, CoreError::ResourceUnavailable { .. }));
        assert!(svc.resource(&ResourceId::new("CPU001")).is_some());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let mut svc = service();
        svc.register_user("alice", "pw1", Role::Student).unwrap();
        let err = svc
            .register_user("alice", "pw2", Role::Teacher)
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId { .. }));
    }

    #[test]
    fn user_ids_are_sequential_per_role() {
        let mut svc = service();
        let a = svc.register_user("alice", "pw", Role::Student).unwrap();
        let b = svc.register_user("bob", "pw", Role::Student).unwrap();
        let c = svc.register_user("carol", "pw", Role::Teacher).unwrap();
        assert_eq!(a.as_str(), "student001");
        assert_eq!(b.as_str(), "student002");
        assert_eq!(c.as_str(), "teacher001");
    }

    #[test]
    fn authenticate_checks_password() {
        let mut svc = service();
        svc.register_user("alice", "correct horse", Role::Student)
            .unwrap();
        assert!(svc.authenticate("alice", "correct horse").is_some());
        assert!(svc.authenticate("alice", "wrong").is_none());
        assert!(svc.authenticate("nobody", "whatever").is_none());
    }

    #[test]
    fn seed_is_idempotent() {
        let mut svc = service();
        svc.seed_defaults().unwrap();
        let users_before = svc.users().count();
        svc.seed_defaults().unwrap();
        assert_eq!(svc.users().count(), users_before);

        let admin = svc.authenticate("admin", "admin123").unwrap();
        assert!(admin.role.is_admin());
    }
}
