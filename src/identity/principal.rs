//! # Principal Model
//!
//! One record per human user. Records are created by registration and
//! mutated only by authentication bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{IdentityError, IdentityResult};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Authorization role of a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may attempt writer-lock acquisition and mutations
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Writer | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Principal record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Unique, case-sensitive username
    pub username: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Role granted at registration
    pub role: Role,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,

    /// Consecutive failed authentication attempts
    pub failed_attempts: u32,

    /// While set and in the future, all authentication fails immediately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn new(username: String, password_hash: String, role: Role) -> Self {
        Self {
            username,
            password_hash,
            role,
            created_at: Utc::now(),
            last_login_at: None,
            failed_attempts: 0,
            locked_until: None,
        }
    }

    /// Remaining lockout in whole seconds, if any
    pub fn lockout_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.locked_until {
            Some(until) if until > now => Some((until - now).num_seconds().max(1)),
            _ => None,
        }
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// The part of a principal other components are allowed to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub username: String,
    pub role: Role,
}

/// Validate username shape: 3-50 chars from `[A-Za-z0-9_-]`
pub fn validate_username(username: &str) -> IdentityResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(IdentityError::InvalidUsername(format!(
            "must be {}-{} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IdentityError::InvalidUsername(
            "only letters, digits, '_' and '-' are allowed".to_string(),
        ));
    }

    Ok(())
}

/// Validate password policy: 6-128 chars, at least one letter and one digit
pub fn validate_password(password: &str) -> IdentityResult<()> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(IdentityError::WeakPassword(format!(
            "must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(IdentityError::WeakPassword(format!(
            "must be at most {} characters",
            PASSWORD_MAX_LEN
        )));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(IdentityError::WeakPassword(
            "must contain at least one letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(IdentityError::WeakPassword(
            "must contain at least one digit".to_string(),
        ));
    }
    Ok(())
}
