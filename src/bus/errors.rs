//! # Event Bus Errors

use thiserror::Error;

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Event bus errors
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// No subscription with that id
    #[error("Subscription not found")]
    SubscriptionNotFound,

    /// Bus registry is unusable (poisoned lock)
    #[error("Internal bus error: {0}")]
    Internal(String),
}
