//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store collaborator errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No row with the requested id
    #[error("Not found")]
    NotFound,

    /// The backing substrate failed; the message is for operator logs only
    #[error("Backend error: {0}")]
    Backend(String),
}
