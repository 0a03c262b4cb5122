//! # Store
//!
//! Persistence collaborator for messages and audit entries. The core only
//! talks to the trait; the concrete substrate (in-memory or SQLite) is
//! injected at construction. No other component may reach the store
//! directly.

pub mod errors;
pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::entry::{AuditEntry, NewAuditEntry};
use crate::messages::model::Message;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Hard cap on page numbers
pub const PAGE_MAX: u32 = 1000;
/// Hard cap on page sizes
pub const LIMIT_MAX: u32 = 100;

/// Minimal persistence contract.
///
/// Message and audit ids are assigned by the store and must be strictly
/// increasing across the service lifetime, including across restarts.
pub trait Store: Send + Sync {
    fn put_message(
        &self,
        author: &str,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64>;

    fn update_message(&self, id: i64, body: &str, updated_at: DateTime<Utc>) -> StoreResult<()>;

    fn delete_message(&self, id: i64) -> StoreResult<()>;

    fn get_message_author(&self, id: i64) -> StoreResult<String>;

    /// Newest-first page of messages plus the total count
    fn list_messages(&self, offset: usize, limit: usize) -> StoreResult<(Vec<Message>, u64)>;

    fn append_audit(&self, entry: &NewAuditEntry) -> StoreResult<i64>;

    /// Newest-first page of audit entries plus the total count
    fn list_audit(&self, offset: usize, limit: usize) -> StoreResult<(Vec<AuditEntry>, u64)>;
}

/// One page of a paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, limit: u32, total: u64) -> Self {
        let has_more = u64::from(page) * u64::from(limit) < total;
        Self {
            items,
            page,
            limit,
            total,
            has_more,
        }
    }
}

/// Validate pagination parameters and compute the store offset.
///
/// `page` must be in `[1, 1000]`, `limit` in `[1, 100]`.
pub fn page_offset(page: u32, limit: u32) -> Result<usize, String> {
    if !(1..=PAGE_MAX).contains(&page) {
        return Err(format!("page must be in [1, {}]", PAGE_MAX));
    }
    if !(1..=LIMIT_MAX).contains(&limit) {
        return Err(format!("limit must be in [1, {}]", LIMIT_MAX));
    }
    Ok((page as usize - 1) * limit as usize)
}
