//! # Session Errors

use thiserror::Error;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Token issue/verification errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Token signature is valid but the token has expired
    #[error("Token expired")]
    TokenExpired,

    /// Token is malformed or carries an invalid signature
    #[error("Invalid token")]
    TokenInvalid,

    /// Token subject no longer resolves in the identity registry
    #[error("Unknown principal")]
    UserUnknown,

    /// Role in the token no longer matches the principal's current role
    #[error("Token role does not match principal role")]
    RoleMismatch,

    /// Token could not be signed
    #[error("Internal error: token signing failed")]
    SigningFailed,
}
