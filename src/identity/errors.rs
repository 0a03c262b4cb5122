//! # Identity Errors

use thiserror::Error;

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Identity registry errors
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// Username fails the shape rules (length, charset)
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Password fails the policy
    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    /// Username is already registered
    #[error("Username already taken")]
    UsernameTaken,

    /// Credentials rejected (generic - never reveals which part failed)
    #[error("Invalid credentials")]
    InvalidCredentials {
        /// True when this exact failure crossed the lockout threshold
        lockout_triggered: bool,
    },

    /// Principal is locked out; all attempts fail until the lock expires
    #[error("Account locked")]
    AccountLocked {
        /// Seconds until the lockout expires
        retry_after_secs: i64,
    },

    /// No principal with that username
    #[error("Principal not found")]
    NotFound,

    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Registry state is unusable (poisoned lock)
    #[error("Internal registry error: {0}")]
    Internal(String),
}
