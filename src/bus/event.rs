//! # Bus Events
//!
//! The tagged event shapes delivered to subscribers. Within a subscription,
//! events arrive in the order their originating component committed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lock::state::LockSnapshot;

/// What happened to the writer lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterTransition {
    Acquired,
    Released,
    Forced,
}

/// One event on the live feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Full lock state; sent as the snapshot on subscribe and re-emitted
    /// by reconciliation when the state changed
    LockState {
        lock_value: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        holder: Option<String>,
        writer_enabled: bool,
        ts: DateTime<Utc>,
    },

    MessageCreated {
        id: i64,
        author: String,
        body: String,
        ts: DateTime<Utc>,
    },

    MessageUpdated {
        id: i64,
        author: String,
        body: String,
        ts: DateTime<Utc>,
    },

    MessageDeleted {
        id: i64,
        ts: DateTime<Utc>,
    },

    AdminToggle {
        admin: String,
        enabled: bool,
        ts: DateTime<Utc>,
    },

    WriterChanged {
        event: WriterTransition,
        principal: String,
        ts: DateTime<Utc>,
    },
}

impl Event {
    /// Build a `lock_state` event from a lock snapshot
    pub fn lock_state(snapshot: &LockSnapshot) -> Self {
        Event::LockState {
            lock_value: snapshot.lock_value,
            holder: snapshot.holder.clone(),
            writer_enabled: snapshot.writer_enabled,
            ts: snapshot.ts,
        }
    }

    pub fn writer_changed(transition: WriterTransition, principal: &str) -> Self {
        Event::WriterChanged {
            event: transition,
            principal: principal.to_string(),
            ts: Utc::now(),
        }
    }

    pub fn admin_toggle(admin: &str, enabled: bool) -> Self {
        Event::AdminToggle {
            admin: admin.to_string(),
            enabled,
            ts: Utc::now(),
        }
    }
}
