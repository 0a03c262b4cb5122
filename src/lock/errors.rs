//! # Lock Errors
//!
//! Contention outcomes are expected during normal operation; only
//! `Unavailable` is retryable.

use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Writer lock errors
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// Another principal holds the lock; retry later
    #[error("Writer lock held by '{holder}'")]
    Unavailable { holder: String },

    /// Writer access is globally disabled by an admin
    #[error("Writer access is disabled")]
    WriterDisabled,

    /// Caller's role may not acquire the lock
    #[error("Role may not acquire the writer lock")]
    Forbidden,

    /// Release attempted by a principal that is not the holder
    #[error("Writer lock is held by another principal")]
    NotHolder,

    /// Release attempted while the lock is free
    #[error("Writer lock is not held")]
    NotHeld,

    /// Lock state is unusable (poisoned mutex)
    #[error("Internal lock error: {0}")]
    Internal(String),
}
