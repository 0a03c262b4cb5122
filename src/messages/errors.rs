//! # Message Service Errors

use thiserror::Error;

/// Result type for message operations
pub type MessageResult<T> = Result<T, MessageError>;

/// Message service errors
#[derive(Debug, Clone, Error)]
pub enum MessageError {
    /// Body or pagination parameters out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller does not hold the writer lock
    #[error("Writer lock not held by caller")]
    SemaphoreNotHeld,

    /// No message with that id
    #[error("Message not found")]
    NotFound,

    /// Caller is not the author of the message
    #[error("Only the author may modify a message")]
    Forbidden,

    /// Backing store failed
    #[error("Store error: {0}")]
    Store(String),
}
