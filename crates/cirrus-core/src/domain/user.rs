//! System users and their account balances.
//!
//! Students, teachers and admins share one record shape; the role fixes the
//! dashboard capabilities at creation time. The stored credential is an
//! Argon2id hash and is redacted from Debug output.

use crate::auth;
use crate::credits::Credits;
use crate::error::{CoreError, Result};
use cirrus_common::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Opaque stored credential. Never logged, never displayed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential(pub(crate) String);

impl Credential {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub(crate) password_hash: Credential,
    pub balance: Credits,
    pub status: UserStatus,
    pub role: Role,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, password_hash: String, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: Credential(password_hash),
            balance: Credits::zero(),
            status: UserStatus::Active,
            role,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Credit the account. Rejects negative amounts.
    pub fn deposit(&mut self, amount: Credits) -> Result<()> {
        if amount.is_negative() {
            return Err(CoreError::InvalidAmount {
                amount: amount.as_decimal(),
            });
        }
        self.balance = self.balance.add(amount);
        Ok(())
    }

    /// Debit the account. Rejects negative amounts and overdrafts.
    pub fn withdraw(&mut self, amount: Credits) -> Result<()> {
        if amount.is_negative() {
            return Err(CoreError::InvalidAmount {
                amount: amount.as_decimal(),
            });
        }
        self.balance =
            self.balance
                .checked_sub(amount)
                .ok_or_else(|| CoreError::InsufficientFunds {
                    available: self.balance.as_decimal(),
                    required: amount.as_decimal(),
                })?;
        Ok(())
    }

    /// Debit the account allowing a negative balance. Used only when the
    /// operator has enabled overdraft.
    pub fn withdraw_with_overdraft(&mut self, amount: Credits) -> Result<()> {
        if amount.is_negative() {
            return Err(CoreError::InvalidAmount {
                amount: amount.as_decimal(),
            });
        }
        self.balance = self.balance.saturating_debit(amount);
        Ok(())
    }

    pub fn verify_password(&self, plain: &str) -> bool {
        auth::verify_password(self.password_hash.as_str(), plain)
    }
}
