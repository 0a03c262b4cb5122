//! # SQLite Store
//!
//! Durable store over two databases: one for the chat log, one for the
//! transaction log. WAL mode keeps readers concurrent with the single
//! writer; `AUTOINCREMENT` keeps ids monotonic across restarts and deletes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::audit::entry::{AuditEntry, NewAuditEntry};
use crate::messages::model::Message;

use super::errors::{StoreError, StoreResult};
use super::Store;

/// SQLite-backed [`Store`] implementation
pub struct SqliteStore {
    chat: Arc<Mutex<Connection>>,
    logs: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the chat and logs databases at the given paths.
    pub fn open(chat_path: &Path, logs_path: &Path) -> StoreResult<Self> {
        let chat = Connection::open(chat_path).map_err(backend)?;
        let logs = Connection::open(logs_path).map_err(backend)?;
        Self::from_connections(chat, logs)
    }

    /// Fully in-memory databases, for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let chat = Connection::open_in_memory().map_err(backend)?;
        let logs = Connection::open_in_memory().map_err(backend)?;
        Self::from_connections(chat, logs)
    }

    fn from_connections(chat: Connection, logs: Connection) -> StoreResult<Self> {
        // WAL keeps concurrent readers off the writer's back.
        let _ = chat.pragma_update(None, "journal_mode", "WAL");
        let _ = logs.pragma_update(None, "journal_mode", "WAL");

        Self::init_chat_schema(&chat)?;
        Self::init_logs_schema(&logs)?;

        Ok(Self {
            chat: Arc::new(Mutex::new(chat)),
            logs: Arc::new(Mutex::new(logs)),
        })
    }

    fn init_chat_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL CHECK(length(username) > 0),
                message TEXT NOT NULL CHECK(length(message) > 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(backend)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_created_at
             ON messages(created_at DESC)",
            [],
        )
        .map_err(backend)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_username ON messages(username)",
            [],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn init_logs_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                action TEXT NOT NULL,
                user TEXT,
                content TEXT CHECK(content IS NULL OR length(content) <= 2000),
                semaphore_value INTEGER NOT NULL CHECK(semaphore_value IN (0, 1))
            )",
            [],
        )
        .map_err(backend)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_ts ON transactions(ts DESC)",
            [],
        )
        .map_err(backend)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_action ON transactions(action)",
            [],
        )
        .map_err(backend)?;
        Ok(())
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp in store: {}", e)))
}

impl Store for SqliteStore {
    fn put_message(
        &self,
        author: &str,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let conn = self
            .chat
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let ts = created_at.to_rfc3339();
        conn.execute(
            "INSERT INTO messages (username, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![author, body, ts],
        )
        .map_err(backend)?;

        Ok(conn.last_insert_rowid())
    }

    fn update_message(&self, id: i64, body: &str, updated_at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self
            .chat
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let changed = conn
            .execute(
                "UPDATE messages SET message = ?1, updated_at = ?2 WHERE id = ?3",
                params![body, updated_at.to_rfc3339(), id],
            )
            .map_err(backend)?;

        if changed == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn delete_message(&self, id: i64) -> StoreResult<()> {
        let conn = self
            .chat
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let changed = conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])
            .map_err(backend)?;

        if changed == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn get_message_author(&self, id: i64) -> StoreResult<String> {
        let conn = self
            .chat
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        conn.query_row(
            "SELECT username FROM messages WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => backend(other),
        })
    }

    fn list_messages(&self, offset: usize, limit: usize) -> StoreResult<(Vec<Message>, u64)> {
        let conn = self
            .chat
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let total: u64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .map_err(backend)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, username, message, created_at, updated_at
                 FROM messages ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(backend)?;

        let mut items = Vec::new();
        for row in rows {
            let (id, author, body, created_raw, updated_raw) = row.map_err(backend)?;
            items.push(Message {
                id,
                author,
                body,
                created_at: parse_ts(&created_raw)?,
                updated_at: parse_ts(&updated_raw)?,
            });
        }

        Ok((items, total))
    }

    fn append_audit(&self, entry: &NewAuditEntry) -> StoreResult<i64> {
        let conn = self
            .logs
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        conn.execute(
            "INSERT INTO transactions (ts, action, user, content, semaphore_value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.ts.to_rfc3339(),
                entry.action.as_str(),
                entry.principal,
                entry.content,
                entry.lock_value
            ],
        )
        .map_err(backend)?;

        Ok(conn.last_insert_rowid())
    }

    fn list_audit(&self, offset: usize, limit: usize) -> StoreResult<(Vec<AuditEntry>, u64)> {
        let conn = self
            .logs
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        let total: u64 = conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .map_err(backend)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, ts, action, user, content, semaphore_value
                 FROM transactions ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, u8>(5)?,
                ))
            })
            .map_err(backend)?;

        let mut items = Vec::new();
        for row in rows {
            let (id, ts_raw, action_raw, principal, content, lock_value) =
                row.map_err(backend)?;
            items.push(AuditEntry {
                id,
                ts: parse_ts(&ts_raw)?,
                action: action_raw.parse().map_err(StoreError::Backend)?,
                principal,
                content: content.unwrap_or_default(),
                lock_value,
            });
        }

        Ok((items, total))
    }
}
