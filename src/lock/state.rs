//! # Lock State
//!
//! The externally observable shape of the writer lock. `lock_value` keeps
//! the daemon's wire convention: 0 = held, 1 = free.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{LOCK_FREE, LOCK_HELD};

/// The two states of the writer lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Held {
        owner: String,
        acquired_at: DateTime<Utc>,
    },
}

impl LockStatus {
    pub fn is_free(&self) -> bool {
        matches!(self, LockStatus::Free)
    }

    pub fn holder(&self) -> Option<&str> {
        match self {
            LockStatus::Free => None,
            LockStatus::Held { owner, .. } => Some(owner),
        }
    }

    /// Wire encoding: 0 when held, 1 when free
    pub fn lock_value(&self) -> u8 {
        if self.is_free() {
            LOCK_FREE
        } else {
            LOCK_HELD
        }
    }
}

/// Point-in-time view of `(status, writer_enabled)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSnapshot {
    /// 0 = held, 1 = free
    pub lock_value: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    pub writer_enabled: bool,
    pub ts: DateTime<Utc>,
}

/// Result of an ownership check for a given principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// The principal holds the lock
    Owned,
    /// Nobody holds the lock
    NotHeld,
    /// Somebody else holds the lock
    NotHolder { holder: String },
}
