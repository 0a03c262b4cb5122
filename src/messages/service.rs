//! # Message Service
//!
//! Every mutation runs as one logical critical section: check lock
//! ownership, mutate the store, append the audit entry, publish the event.
//! A service-level commit mutex keeps those four steps in one total order
//! without ever holding the writer lock's own mutex across a store call:
//! if the store fails after the ownership check, the lock is untouched and
//! the failure surfaces to the caller.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::{AuditAction, AuditLog, LOCK_HELD};
use crate::bus::{Event, EventBus};
use crate::lock::{Ownership, WriterLock};
use crate::store::{page_offset, Page, Store, StoreError};

use super::errors::{MessageError, MessageResult};
use super::model::{validate_body, Message};

/// Result of a successful update, for the response envelope
#[derive(Debug, Clone, Serialize)]
pub struct MessageUpdate {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub updated_at: DateTime<Utc>,
}

/// CRUD over the message log, gated by writer-lock ownership.
pub struct MessageService {
    store: Arc<dyn Store>,
    lock: Arc<WriterLock>,
    audit: Arc<AuditLog>,
    bus: Arc<EventBus>,
    /// Serializes mutations so message ids, audit ids and event order agree
    commit: Mutex<()>,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn Store>,
        lock: Arc<WriterLock>,
        audit: Arc<AuditLog>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            lock,
            audit,
            bus,
            commit: Mutex::new(()),
        }
    }

    /// Newest-first page of messages. Open to any authenticated role; the
    /// read is audited with the lock state observed at the time.
    pub fn list(
        &self,
        page: u32,
        limit: u32,
        caller: Option<&str>,
    ) -> MessageResult<Page<Message>> {
        let offset = page_offset(page, limit).map_err(MessageError::InvalidInput)?;

        let (items, total) = self
            .store
            .list_messages(offset, limit as usize)
            .map_err(store_error)?;

        self.audit.append(
            AuditAction::Read,
            caller,
            &format!("listed messages (page {}, limit {})", page, limit),
            self.lock.status().lock_value,
        );

        Ok(Page::new(items, page, limit, total))
    }

    /// Append a message; the caller must hold the writer lock.
    pub fn create(&self, username: &str, body: &str) -> MessageResult<Message> {
        let body = validate_body(body)?.to_string();

        let _commit = self
            .commit
            .lock()
            .map_err(|_| MessageError::Store("commit section poisoned".into()))?;

        self.require_ownership(username)?;

        let created_at = Utc::now();
        let id = self
            .store
            .put_message(username, &body, created_at)
            .map_err(store_error)?;

        self.audit
            .append(AuditAction::Create, Some(username), &body, LOCK_HELD);
        self.bus.publish(Event::MessageCreated {
            id,
            author: username.to_string(),
            body: body.clone(),
            ts: created_at,
        });

        Ok(Message {
            id,
            author: username.to_string(),
            body,
            created_at,
            updated_at: created_at,
        })
    }

    /// Edit a message; the caller must hold the lock *and* be the author.
    pub fn update(&self, username: &str, id: i64, body: &str) -> MessageResult<MessageUpdate> {
        let body = validate_body(body)?.to_string();

        let _commit = self
            .commit
            .lock()
            .map_err(|_| MessageError::Store("commit section poisoned".into()))?;

        self.require_ownership(username)?;

        let author = match self.store.get_message_author(id) {
            Ok(author) => author,
            Err(StoreError::NotFound) => return Err(MessageError::NotFound),
            Err(e) => return Err(store_error(e)),
        };
        if author != username {
            return Err(MessageError::Forbidden);
        }

        let updated_at = Utc::now();
        self.store
            .update_message(id, &body, updated_at)
            .map_err(|e| match e {
                StoreError::NotFound => MessageError::NotFound,
                other => store_error(other),
            })?;

        self.audit.append(
            AuditAction::Update,
            Some(username),
            &format!("updated message {}", id),
            LOCK_HELD,
        );
        self.bus.publish(Event::MessageUpdated {
            id,
            author: author.clone(),
            body: body.clone(),
            ts: updated_at,
        });

        Ok(MessageUpdate {
            id,
            author,
            body,
            updated_at,
        })
    }

    /// Remove a message; same authorization as `update`.
    pub fn delete(&self, username: &str, id: i64) -> MessageResult<i64> {
        let _commit = self
            .commit
            .lock()
            .map_err(|_| MessageError::Store("commit section poisoned".into()))?;

        self.require_ownership(username)?;

        let author = match self.store.get_message_author(id) {
            Ok(author) => author,
            Err(StoreError::NotFound) => return Err(MessageError::NotFound),
            Err(e) => return Err(store_error(e)),
        };
        if author != username {
            return Err(MessageError::Forbidden);
        }

        self.store.delete_message(id).map_err(|e| match e {
            StoreError::NotFound => MessageError::NotFound,
            other => store_error(other),
        })?;

        self.audit.append(
            AuditAction::Delete,
            Some(username),
            &format!("deleted message {}", id),
            LOCK_HELD,
        );
        self.bus.publish(Event::MessageDeleted {
            id,
            ts: Utc::now(),
        });

        Ok(id)
    }

    fn require_ownership(&self, username: &str) -> MessageResult<()> {
        match self.lock.check_owner(username) {
            Ownership::Owned => Ok(()),
            Ownership::NotHeld | Ownership::NotHolder { .. } => {
                Err(MessageError::SemaphoreNotHeld)
            }
        }
    }
}

fn store_error(e: StoreError) -> MessageError {
    MessageError::Store(e.to_string())
}
