//! # Writer Lock
//!
//! Strict two-state binary lock with an admin enable flag. Acquisition is
//! non-blocking: callers get an immediate win or an immediate, retryable
//! loss. Every transition appends its audit entry and publishes its event
//! inside the same critical section, so audit ids, event order and lock
//! state can never disagree.
//!
//! The critical section contains only O(1) state work plus those in-memory
//! appends; password hashing and store calls never happen under it.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::audit::{AuditAction, AuditLog, LOCK_FREE, LOCK_HELD};
use crate::bus::{Event, EventBus, WriterTransition};
use crate::identity::Role;
use crate::observability::Logger;

use super::errors::{LockError, LockResult};
use super::state::{LockSnapshot, LockStatus, Ownership};

struct LockInner {
    status: LockStatus,
    writer_enabled: bool,
}

/// The singleton writer lock.
///
/// Held behind a component interface so tests can instantiate isolated
/// cores; nothing else may mutate the state.
pub struct WriterLock {
    inner: Mutex<LockInner>,
    audit: Arc<AuditLog>,
    bus: Arc<EventBus>,
}

impl WriterLock {
    pub fn new(audit: Arc<AuditLog>, bus: Arc<EventBus>) -> Self {
        Self {
            inner: Mutex::new(LockInner {
                status: LockStatus::Free,
                writer_enabled: true,
            }),
            audit,
            bus,
        }
    }

    /// Attempt to acquire the lock for `username`.
    ///
    /// Never waits. Exactly one of two concurrent callers observes the
    /// `Free -> Held` edge; the other sees `Unavailable` naming the winner.
    pub fn try_acquire(&self, username: &str, role: Role) -> LockResult<DateTime<Utc>> {
        if !role.can_write() {
            return Err(LockError::Forbidden);
        }

        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LockError::Internal("lock state poisoned".into()))?;

        if !inner.writer_enabled {
            return Err(LockError::WriterDisabled);
        }

        if let LockStatus::Held { owner, .. } = &inner.status {
            return Err(LockError::Unavailable {
                holder: owner.clone(),
            });
        }

        let acquired_at = Utc::now();
        inner.status = LockStatus::Held {
            owner: username.to_string(),
            acquired_at,
        };

        self.audit.append(
            AuditAction::Acquire,
            Some(username),
            "acquired writer lock",
            LOCK_HELD,
        );
        self.bus
            .publish(Event::writer_changed(WriterTransition::Acquired, username));
        Logger::info("WRITER_ACQUIRED", &[("holder", username)]);

        Ok(acquired_at)
    }

    /// Release the lock; only the holder may do so.
    pub fn release(&self, username: &str) -> LockResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LockError::Internal("lock state poisoned".into()))?;

        match &inner.status {
            LockStatus::Free => Err(LockError::NotHeld),
            LockStatus::Held { owner, .. } if owner != username => Err(LockError::NotHolder),
            LockStatus::Held { .. } => {
                inner.status = LockStatus::Free;

                self.audit.append(
                    AuditAction::Release,
                    Some(username),
                    "released writer lock",
                    LOCK_FREE,
                );
                self.bus
                    .publish(Event::writer_changed(WriterTransition::Released, username));
                Logger::info("WRITER_RELEASED", &[("holder", username)]);

                Ok(())
            }
        }
    }

    /// Forced release because the holder's client is gone (subscription
    /// closed and grace elapsed, token expired, or logout).
    ///
    /// No-op unless `username` is the current holder. Returns whether a
    /// release happened.
    pub fn client_vanished(&self, username: &str) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };

        match &inner.status {
            LockStatus::Held { owner, .. } if owner == username => {
                inner.status = LockStatus::Free;

                self.audit.append(
                    AuditAction::Release,
                    Some(username),
                    "reason=client-gone",
                    LOCK_FREE,
                );
                self.bus
                    .publish(Event::writer_changed(WriterTransition::Released, username));
                Logger::warn("WRITER_CLIENT_GONE", &[("holder", username)]);

                true
            }
            _ => false,
        }
    }

    /// Admin control over the enable flag.
    ///
    /// Disabling while held force-releases the holder first: the audit log
    /// gains `ADMIN_FORCE_RELEASE` then `ADMIN_TOGGLE`, and subscribers see
    /// `writer_changed{forced}` then `admin_toggle`, in that order.
    pub fn admin_set_enabled(&self, enabled: bool, admin: &str) -> LockResult<LockSnapshot> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LockError::Internal("lock state poisoned".into()))?;

        if enabled {
            inner.writer_enabled = true;
            let lock_value = inner.status.lock_value();

            self.audit.append(
                AuditAction::AdminToggle,
                Some(admin),
                "writer access enabled",
                lock_value,
            );
            self.bus.publish(Event::admin_toggle(admin, true));
            Logger::info("WRITER_TOGGLE", &[("admin", admin), ("enabled", "true")]);
        } else {
            let previous_owner = inner.status.holder().map(str::to_string);
            inner.status = LockStatus::Free;
            inner.writer_enabled = false;

            if let Some(owner) = previous_owner {
                self.audit.append(
                    AuditAction::AdminForceRelease,
                    Some(&owner),
                    &format!("forced release by admin '{}'", admin),
                    LOCK_FREE,
                );
                self.bus
                    .publish(Event::writer_changed(WriterTransition::Forced, &owner));
                Logger::warn(
                    "WRITER_FORCE_RELEASED",
                    &[("admin", admin), ("holder", &owner)],
                );
            }

            self.audit.append(
                AuditAction::AdminToggle,
                Some(admin),
                "writer access disabled",
                LOCK_FREE,
            );
            self.bus.publish(Event::admin_toggle(admin, false));
            Logger::info("WRITER_TOGGLE", &[("admin", admin), ("enabled", "false")]);
        }

        Ok(snapshot_of(&inner))
    }

    /// Ownership check for message mutations; atomic with respect to the
    /// other lock operations.
    pub fn check_owner(&self, username: &str) -> Ownership {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            // A poisoned mutex still holds valid state; read it anyway.
            Err(poisoned) => poisoned.into_inner(),
        };

        match &inner.status {
            LockStatus::Free => Ownership::NotHeld,
            LockStatus::Held { owner, .. } if owner == username => Ownership::Owned,
            LockStatus::Held { owner, .. } => Ownership::NotHolder {
                holder: owner.clone(),
            },
        }
    }

    /// Current `(status, writer_enabled)` as a wire-ready snapshot.
    pub fn status(&self) -> LockSnapshot {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        snapshot_of(&inner)
    }
}

fn snapshot_of(inner: &LockInner) -> LockSnapshot {
    LockSnapshot {
        lock_value: inner.status.lock_value(),
        holder: inner.status.holder().map(str::to_string),
        writer_enabled: inner.writer_enabled,
        ts: Utc::now(),
    }
}
