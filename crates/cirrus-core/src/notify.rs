//! In-system notifications.
//!
//! Every lifecycle event the user should see (approval, rejection, billing,
//! payment failure) lands here as a persisted record. The `Notifier` trait
//! is the seam for alternative delivery channels; the built-in
//! `NotificationLog` simply appends to a persisted collection.

use crate::store::Collection;
use chrono::{DateTime, Utc};
use cirrus_common::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub priority: Priority,
    pub read: bool,
}

/// Delivery seam for notifications.
pub trait Notifier {
    fn notify(&mut self, user_id: &UserId, message: &str, priority: Priority, now: DateTime<Utc>);
}

#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Collection<Notification>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collection(entries: Collection<Notification>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &Collection<Notification> {
        &self.entries
    }

    pub fn for_user(&self, user_id: &UserId) -> Vec<&Notification> {
        self.entries.filter(|n| &n.user_id == user_id)
    }

    pub fn unread_for(&self, user_id: &UserId) -> Vec<&Notification> {
        self.entries.filter(|n| &n.user_id == user_id && !n.read)
    }

    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.entries.find_mut(&id.to_string()) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    /// Drop a user's read notifications, keeping unread ones. Returns how
    /// many were removed.
    pub fn clear_read(&mut self, user_id: &UserId) -> usize {
        let ids: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|n| &n.user_id == user_id && n.read)
            .map(|n| n.id)
            .collect();
        for id in &ids {
            let _ = self.entries.remove(&id.to_string());
        }
        ids.len()
    }

    pub fn mark_all_read(&mut self, user_id: &UserId) -> usize {
        let mut marked = 0;
        for entry in self.entries.iter_mut() {
            if &entry.user_id == user_id && !entry.read {
                entry.read = true;
                marked += 1;
            }
        }
        marked
    }
}

impl Notifier for NotificationLog {
    fn notify(&mut self, user_id: &UserId, message: &str, priority: Priority, now: DateTime<Utc>) {
        let entry = Notification {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            message: message.to_string(),
            sent_at: now,
            priority,
            read: false,
        };
        debug!(user_id = %user_id, priority = %priority, "notification queued");
        // Fresh v4 id, cannot collide with an existing entry.
        let _ = self.entries.add(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_tracking() {
        let mut log = NotificationLog::new();
        let alice = UserId::new("student001");
        let bob = UserId::new("teacher001");
        let now = Utc::now();

        log.notify(&alice, "request approved", Priority::Medium, now);
        log.notify(&alice, "bill generated", Priority::Medium, now);
        log.notify(&bob, "payment failed", Priority::High, now);

        assert_eq!(log.unread_for(&alice).len(), 2);
        assert_eq!(log.unread_for(&bob).len(), 1);

        let first = log.unread_for(&alice)[0].id;
        assert!(log.mark_read(first));
        assert_eq!(log.unread_for(&alice).len(), 1);
        assert_eq!(log.for_user(&alice).len(), 2);
    }

    #[test]
    fn mark_all_read_only_touches_one_user() {
        let mut log = NotificationLog::new();
        let alice = UserId::new("student001");
        let bob = UserId::new("teacher001");
        let now = Utc::now();

        log.notify(&alice, "a", Priority::Low, now);
        log.notify(&alice, "b", Priority::Low, now);
        log.notify(&bob, "c", Priority::Low, now);

        assert_eq!(log.mark_all_read(&alice), 2);
        assert!(log.unread_for(&alice).is_empty());
        assert_eq!(log.unread_for(&bob).len(), 1);
    }

    #[test]
    fn clear_read_keeps_unread() {
        let mut log = NotificationLog::new();
        let alice = UserId::new("student001");
        let now = Utc::now();

        log.notify(&alice, "a", Priority::Low, now);
        log.notify(&alice, "b", Priority::Low, now);
        let first = log.unread_for(&alice)[0].id;
        log.mark_read(first);

        assert_eq!(log.clear_read(&alice), 1);
        assert_eq!(log.for_user(&alice).len(), 1);
        assert_eq!(log.unread_for(&alice).len(), 1);
    }

    #[test]
    fn unknown_id_is_not_marked() {
        let mut log = NotificationLog::new();
        assert!(!log.mark_read(Uuid::new_v4()));
    }
}
