//! # Presence Tracking
//!
//! Per-principal state machine feeding the writer lock's client-vanished
//! release: `Absent -> Active` on any authenticated request, `Active ->
//! Grace` when the last live subscription closes, `Grace -> Absent` after
//! the grace window with no further activity. Token expiry forces `Absent`
//! regardless of state.
//!
//! Transport liveness is not principal liveness: a principal may hold the
//! lock with no open subscription, so only the machine above - never a raw
//! connection close - may declare a principal gone.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Liveness state of one principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Absent,
    Active,
    Grace,
}

#[derive(Debug, Clone)]
struct PresenceRecord {
    state: PresenceState,
    last_activity: DateTime<Utc>,
    subscriptions: usize,
    token_expires_at: Option<DateTime<Utc>>,
}

/// Tracks every principal's presence.
pub struct PresenceTracker {
    grace: Duration,
    records: RwLock<HashMap<String, PresenceRecord>>,
}

impl PresenceTracker {
    pub fn new(grace_secs: i64) -> Self {
        Self {
            grace: Duration::seconds(grace_secs),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Any authenticated request arrived for this principal.
    pub fn touch(&self, username: &str, token_expires_at: Option<DateTime<Utc>>) {
        let Ok(mut records) = self.records.write() else {
            return;
        };
        let record = records
            .entry(username.to_string())
            .or_insert_with(|| PresenceRecord {
                state: PresenceState::Active,
                last_activity: Utc::now(),
                subscriptions: 0,
                token_expires_at,
            });
        record.state = PresenceState::Active;
        record.last_activity = Utc::now();
        if token_expires_at.is_some() {
            record.token_expires_at = token_expires_at;
        }
    }

    /// A live subscription opened.
    pub fn subscribed(&self, username: &str) {
        let Ok(mut records) = self.records.write() else {
            return;
        };
        let record = records
            .entry(username.to_string())
            .or_insert_with(|| PresenceRecord {
                state: PresenceState::Active,
                last_activity: Utc::now(),
                subscriptions: 0,
                token_expires_at: None,
            });
        record.subscriptions += 1;
        record.state = PresenceState::Active;
        record.last_activity = Utc::now();
    }

    /// A live subscription closed. With no subscriptions left, the
    /// principal enters the grace window.
    pub fn unsubscribed(&self, username: &str) {
        let Ok(mut records) = self.records.write() else {
            return;
        };
        if let Some(record) = records.get_mut(username) {
            record.subscriptions = record.subscriptions.saturating_sub(1);
            if record.subscriptions == 0 {
                record.state = PresenceState::Grace;
                record.last_activity = Utc::now();
            }
        }
    }

    /// Explicit logout: immediately absent.
    pub fn logout(&self, username: &str) {
        if let Ok(mut records) = self.records.write() {
            records.remove(username);
        }
    }

    pub fn state_of(&self, username: &str) -> PresenceState {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(username).map(|r| r.state))
            .unwrap_or(PresenceState::Absent)
    }

    /// Expire principals whose grace window or token ran out.
    ///
    /// Returns the usernames that just became absent; the router feeds them
    /// to the writer lock as `client_vanished`.
    pub fn sweep(&self) -> Vec<String> {
        let now = Utc::now();
        let Ok(mut records) = self.records.write() else {
            return Vec::new();
        };

        let vanished: Vec<String> = records
            .iter()
            .filter(|(_, record)| {
                let token_gone = record
                    .token_expires_at
                    .map(|exp| exp <= now)
                    .unwrap_or(false);
                let grace_over = record.state == PresenceState::Grace
                    && now - record.last_activity > self.grace;
                token_gone || grace_over
            })
            .map(|(username, _)| username.clone())
            .collect();

        for username in &vanished {
            records.remove(username);
        }
        vanished
    }

    /// Test hook: backdate a record's last activity.
    #[cfg(test)]
    pub fn backdate(&self, username: &str, by_secs: i64) {
        if let Ok(mut records) = self.records.write() {
            if let Some(record) = records.get_mut(username) {
                record.last_activity = record.last_activity - Duration::seconds(by_secs);
            }
        }
    }
}
