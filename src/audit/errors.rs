//! # Audit Errors

use thiserror::Error;

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Audit log errors
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// Pagination parameters out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store failed while listing
    #[error("Store error: {0}")]
    Store(String),
}
