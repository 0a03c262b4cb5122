//! # Audit Entries
//!
//! Row shape of the transaction log. `lock_value` follows the daemon's wire
//! convention: 0 when the writer lock was held at the time of the event,
//! 1 when it was free, captured after the action took effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lock was held when the entry was recorded
pub const LOCK_HELD: u8 = 0;
/// Lock was free when the entry was recorded
pub const LOCK_FREE: u8 = 1;

/// Maximum free-text content length per entry
pub const CONTENT_MAX_LEN: usize = 2000;

/// Audited action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Read,
    Acquire,
    Release,
    AdminToggle,
    AdminForceRelease,
    Login,
    LoginFailed,
    Register,
    Lockout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Read => "READ",
            AuditAction::Acquire => "ACQUIRE",
            AuditAction::Release => "RELEASE",
            AuditAction::AdminToggle => "ADMIN_TOGGLE",
            AuditAction::AdminForceRelease => "ADMIN_FORCE_RELEASE",
            AuditAction::Login => "LOGIN",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::Register => "REGISTER",
            AuditAction::Lockout => "LOCKOUT",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            "READ" => Ok(AuditAction::Read),
            "ACQUIRE" => Ok(AuditAction::Acquire),
            "RELEASE" => Ok(AuditAction::Release),
            "ADMIN_TOGGLE" => Ok(AuditAction::AdminToggle),
            "ADMIN_FORCE_RELEASE" => Ok(AuditAction::AdminForceRelease),
            "LOGIN" => Ok(AuditAction::Login),
            "LOGIN_FAILED" => Ok(AuditAction::LoginFailed),
            "REGISTER" => Ok(AuditAction::Register),
            "LOCKOUT" => Ok(AuditAction::Lockout),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

/// An entry before the store has assigned its id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub ts: DateTime<Utc>,
    pub action: AuditAction,
    /// Username, or `None` for system-originated entries
    pub principal: Option<String>,
    /// Bounded free-text context; never raw passwords or tokens
    pub content: String,
    /// 0 = held, 1 = free, after the action's effect
    pub lock_value: u8,
}

impl NewAuditEntry {
    pub fn new(
        action: AuditAction,
        principal: Option<&str>,
        content: &str,
        lock_value: u8,
    ) -> Self {
        Self {
            ts: Utc::now(),
            action,
            principal: principal.map(str::to_string),
            content: truncate_content(content),
            lock_value,
        }
    }

    pub fn with_id(self, id: i64) -> AuditEntry {
        AuditEntry {
            id,
            ts: self.ts,
            action: self.action,
            principal: self.principal,
            content: self.content,
            lock_value: self.lock_value,
        }
    }
}

/// One committed row of the transaction log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Strictly increasing, reflects total commit order
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub content: String,
    pub lock_value: u8,
}

fn truncate_content(content: &str) -> String {
    if content.chars().count() <= CONTENT_MAX_LEN {
        content.to_string()
    } else {
        content.chars().take(CONTENT_MAX_LEN).collect()
    }
}
