//! # In-Memory Store
//!
//! Default store for tests and ephemeral runs. Ids are assigned from
//! monotonic counters under one writer lock, which also gives audit appends
//! the serialization the id contract requires.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::audit::entry::{AuditEntry, NewAuditEntry};
use crate::messages::model::Message;

use super::errors::{StoreError, StoreResult};
use super::Store;

#[derive(Debug, Default)]
struct MemoryInner {
    messages: Vec<Message>,
    next_message_id: i64,
    audit: Vec<AuditEntry>,
    next_audit_id: i64,
}

/// In-memory [`Store`] implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn put_message(
        &self,
        author: &str,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        inner.next_message_id += 1;
        let id = inner.next_message_id;
        inner.messages.push(Message {
            id,
            author: author.to_string(),
            body: body.to_string(),
            created_at,
            updated_at: created_at,
        });
        Ok(id)
    }

    fn update_message(&self, id: i64, body: &str, updated_at: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        match inner.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.body = body.to_string();
                message.updated_at = updated_at;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete_message(&self, id: i64) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let before = inner.messages.len();
        inner.messages.retain(|m| m.id != id);
        if inner.messages.len() == before {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn get_message_author(&self, id: i64) -> StoreResult<String> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        inner
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.author.clone())
            .ok_or(StoreError::NotFound)
    }

    fn list_messages(&self, offset: usize, limit: usize) -> StoreResult<(Vec<Message>, u64)> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        // Insertion order is id order, so newest-first is a reverse scan.
        let items = inner
            .messages
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((items, inner.messages.len() as u64))
    }

    fn append_audit(&self, entry: &NewAuditEntry) -> StoreResult<i64> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        inner.next_audit_id += 1;
        let id = inner.next_audit_id;
        inner.audit.push(entry.clone().with_id(id));
        Ok(id)
    }

    fn list_audit(&self, offset: usize, limit: usize) -> StoreResult<(Vec<AuditEntry>, u64)> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let items = inner
            .audit
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((items, inner.audit.len() as u64))
    }
}
