//! # Audit Log
//!
//! Append is infallible from the caller's view: when the store cannot take
//! the entry, the entry lands in a bounded in-memory ring and the service
//! keeps running in degraded mode. The originating operation is never
//! rolled back over an audit failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::observability::Logger;
use crate::store::{page_offset, Page, Store};

use super::entry::{AuditAction, AuditEntry, NewAuditEntry};
use super::errors::{AuditError, AuditResult};

/// Append-only transaction log with a degraded in-memory fallback.
pub struct AuditLog {
    store: Arc<dyn Store>,
    /// When true, a store failure on append is fatal instead of degrading
    strict: bool,
    ring_capacity: usize,
    ring: Mutex<VecDeque<AuditEntry>>,
    /// Highest id handed out so far; fallback ids continue from here
    last_id: AtomicI64,
    degraded: AtomicBool,
}

impl AuditLog {
    pub fn new(store: Arc<dyn Store>, ring_capacity: usize, strict: bool) -> Self {
        Self {
            store,
            strict,
            ring_capacity,
            ring: Mutex::new(VecDeque::with_capacity(ring_capacity.min(1024))),
            last_id: AtomicI64::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    /// Append one entry and return its id.
    ///
    /// Callers invoke this inside their commit sections, so ids reflect the
    /// total order of committed operations.
    pub fn append(
        &self,
        action: AuditAction,
        principal: Option<&str>,
        content: &str,
        lock_value: u8,
    ) -> i64 {
        let entry = NewAuditEntry::new(action, principal, content, lock_value);

        match self.store.append_audit(&entry) {
            Ok(id) => {
                self.last_id.fetch_max(id, Ordering::SeqCst);
                id
            }
            Err(e) => {
                if self.strict {
                    Logger::fatal(
                        "AUDIT_STORE_UNAVAILABLE",
                        &[("action", action.as_str()), ("error", &e.to_string())],
                    );
                    panic!("audit store unavailable in strict mode: {}", e);
                }

                self.degraded.store(true, Ordering::SeqCst);
                Logger::warn(
                    "AUDIT_DEGRADED",
                    &[("action", action.as_str()), ("error", &e.to_string())],
                );

                let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
                if let Ok(mut ring) = self.ring.lock() {
                    ring.push_back(entry.with_id(id));
                    while ring.len() > self.ring_capacity {
                        ring.pop_front();
                    }
                }
                id
            }
        }
    }

    /// Newest-first page of committed entries.
    ///
    /// Admin gating happens at the router; the log itself is unprivileged.
    pub fn list(&self, page: u32, limit: u32) -> AuditResult<Page<AuditEntry>> {
        let offset = page_offset(page, limit).map_err(AuditError::InvalidInput)?;
        let (items, total) = self
            .store
            .list_audit(offset, limit as usize)
            .map_err(|e| AuditError::Store(e.to_string()))?;
        Ok(Page::new(items, page, limit, total))
    }

    /// Health flag: true once any append has fallen back to the ring.
    pub fn degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Entries currently held only in the fallback ring.
    pub fn fallback_entries(&self) -> Vec<AuditEntry> {
        self.ring
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{LOCK_FREE, LOCK_HELD};
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use chrono::{DateTime, Utc};

    /// Store whose audit side is switched off, for the degraded path.
    struct AuditlessStore {
        inner: MemoryStore,
    }

    impl Store for AuditlessStore {
        fn put_message(
            &self,
            author: &str,
            body: &str,
            created_at: DateTime<Utc>,
        ) -> StoreResult<i64> {
            self.inner.put_message(author, body, created_at)
        }

        fn update_message(
            &self,
            id: i64,
            body: &str,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.inner.update_message(id, body, updated_at)
        }

        fn delete_message(&self, id: i64) -> StoreResult<()> {
            self.inner.delete_message(id)
        }

        fn get_message_author(&self, id: i64) -> StoreResult<String> {
            self.inner.get_message_author(id)
        }

        fn list_messages(
            &self,
            offset: usize,
            limit: usize,
        ) -> StoreResult<(Vec<crate::messages::Message>, u64)> {
            self.inner.list_messages(offset, limit)
        }

        fn append_audit(&self, _entry: &NewAuditEntry) -> StoreResult<i64> {
            Err(StoreError::Backend("disk gone".into()))
        }

        fn list_audit(&self, offset: usize, limit: usize) -> StoreResult<(Vec<AuditEntry>, u64)> {
            self.inner.list_audit(offset, limit)
        }
    }

    #[test]
    fn test_append_returns_increasing_ids() {
        let log = AuditLog::new(Arc::new(MemoryStore::new()), 100, false);

        let a = log.append(AuditAction::Acquire, Some("writer1"), "acquired", LOCK_HELD);
        let b = log.append(AuditAction::Release, Some("writer1"), "released", LOCK_FREE);
        assert!(b > a);
        assert!(!log.degraded());
    }

    #[test]
    fn test_list_pages_newest_first() {
        let log = AuditLog::new(Arc::new(MemoryStore::new()), 100, false);
        for i in 0..5 {
            log.append(AuditAction::Read, None, &format!("read {}", i), LOCK_FREE);
        }

        let page = log.list(1, 2).unwrap();
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        assert_eq!(page.items[0].content, "read 4");

        let last = log.list(3, 2).unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
    }

    #[test]
    fn test_list_rejects_bad_pagination() {
        let log = AuditLog::new(Arc::new(MemoryStore::new()), 100, false);
        assert!(matches!(log.list(0, 50), Err(AuditError::InvalidInput(_))));
        assert!(matches!(log.list(1, 101), Err(AuditError::InvalidInput(_))));
    }

    #[test]
    fn test_degraded_mode_keeps_entries_in_ring() {
        let store = Arc::new(AuditlessStore {
            inner: MemoryStore::new(),
        });
        let log = AuditLog::new(store, 3, false);

        for i in 0..5 {
            log.append(
                AuditAction::Create,
                Some("writer1"),
                &format!("msg {}", i),
                LOCK_HELD,
            );
        }

        assert!(log.degraded());
        let fallback = log.fallback_entries();
        // Ring keeps only the newest three.
        assert_eq!(fallback.len(), 3);
        assert_eq!(fallback[0].content, "msg 2");
        assert_eq!(fallback[2].content, "msg 4");

        // Ids still strictly increase in degraded mode.
        assert!(fallback[0].id < fallback[1].id && fallback[1].id < fallback[2].id);
    }
}
