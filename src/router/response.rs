//! # Response Envelope
//!
//! Every response is `{ok, data?, error?}`; every failure carries one kind
//! from the closed taxonomy plus a human-readable message and, for
//! retryable kinds, a `retry_after` hint in seconds. Component errors map
//! onto the taxonomy here; infrastructure detail is redacted at the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::AuditError;
use crate::identity::IdentityError;
use crate::lock::LockError;
use crate::messages::MessageError;
use crate::session::SessionError;

/// The closed set of wire error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidCredentials,
    AccountLocked,
    TokenExpired,
    TokenInvalid,
    RoleMismatch,
    Forbidden,
    SemaphoreUnavailable,
    SemaphoreNotHeld,
    WriterDisabled,
    NotFound,
    StoreError,
    Timeout,
    RateLimited,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::InvalidCredentials => "invalid-credentials",
            ErrorKind::AccountLocked => "account-locked",
            ErrorKind::TokenExpired => "token-expired",
            ErrorKind::TokenInvalid => "token-invalid",
            ErrorKind::RoleMismatch => "role-mismatch",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::SemaphoreUnavailable => "semaphore-unavailable",
            ErrorKind::SemaphoreNotHeld => "semaphore-not-held",
            ErrorKind::WriterDisabled => "writer-disabled",
            ErrorKind::NotFound => "not-found",
            ErrorKind::StoreError => "store-error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether clients should retry after a short delay
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorKind::SemaphoreUnavailable | ErrorKind::RateLimited)
    }

    /// Whether user-visible messages must be redacted to avoid leaking
    /// internals
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ErrorKind::StoreError | ErrorKind::Internal)
    }
}

/// Wire form of one failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

/// Uniform response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("envelope serialization cannot fail")
    }
}

impl From<IdentityError> for ErrorBody {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidUsername(reason) => {
                ErrorBody::new(ErrorKind::InvalidInput, format!("invalid username: {}", reason))
            }
            IdentityError::WeakPassword(reason) => {
                ErrorBody::new(ErrorKind::InvalidInput, format!("weak password: {}", reason))
            }
            IdentityError::UsernameTaken => {
                ErrorBody::new(ErrorKind::InvalidInput, "username already taken")
            }
            IdentityError::InvalidCredentials { .. } => {
                ErrorBody::new(ErrorKind::InvalidCredentials, "invalid credentials")
            }
            IdentityError::AccountLocked { retry_after_secs } => {
                ErrorBody::new(ErrorKind::AccountLocked, "account locked")
                    .with_retry_after(retry_after_secs.max(0) as u64)
            }
            IdentityError::NotFound => ErrorBody::new(ErrorKind::NotFound, "principal not found"),
            other @ (IdentityError::HashingFailed | IdentityError::Internal(_)) => {
                ErrorBody::new(ErrorKind::Internal, other.to_string())
            }
        }
    }
}

impl From<SessionError> for ErrorBody {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::TokenExpired => ErrorBody::new(ErrorKind::TokenExpired, "token expired"),
            SessionError::TokenInvalid => ErrorBody::new(ErrorKind::TokenInvalid, "invalid token"),
            SessionError::UserUnknown => {
                ErrorBody::new(ErrorKind::TokenInvalid, "token subject unknown")
            }
            SessionError::RoleMismatch => ErrorBody::new(
                ErrorKind::RoleMismatch,
                "token role does not match principal role",
            ),
            SessionError::SigningFailed => {
                ErrorBody::new(ErrorKind::Internal, "token signing failed")
            }
        }
    }
}

impl From<LockError> for ErrorBody {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Unavailable { holder } => ErrorBody::new(
                ErrorKind::SemaphoreUnavailable,
                format!("writer lock held by '{}'", holder),
            )
            .with_retry_after(1),
            LockError::WriterDisabled => {
                ErrorBody::new(ErrorKind::WriterDisabled, "writer access is disabled")
            }
            LockError::Forbidden => {
                ErrorBody::new(ErrorKind::Forbidden, "role may not acquire the writer lock")
            }
            LockError::NotHolder => {
                ErrorBody::new(ErrorKind::SemaphoreNotHeld, "writer lock held by another principal")
            }
            LockError::NotHeld => {
                ErrorBody::new(ErrorKind::SemaphoreNotHeld, "writer lock is not held")
            }
            LockError::Internal(detail) => ErrorBody::new(ErrorKind::Internal, detail),
        }
    }
}

impl From<MessageError> for ErrorBody {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::InvalidInput(reason) => ErrorBody::new(ErrorKind::InvalidInput, reason),
            MessageError::SemaphoreNotHeld => {
                ErrorBody::new(ErrorKind::SemaphoreNotHeld, "writer lock not held by caller")
            }
            MessageError::NotFound => ErrorBody::new(ErrorKind::NotFound, "message not found"),
            MessageError::Forbidden => {
                ErrorBody::new(ErrorKind::Forbidden, "only the author may modify a message")
            }
            MessageError::Store(detail) => ErrorBody::new(ErrorKind::StoreError, detail),
        }
    }
}

impl From<AuditError> for ErrorBody {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::InvalidInput(reason) => ErrorBody::new(ErrorKind::InvalidInput, reason),
            AuditError::Store(detail) => ErrorBody::new(ErrorKind::StoreError, detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::SemaphoreUnavailable).unwrap(),
            "\"semaphore-unavailable\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::AccountLocked).unwrap(),
            "\"account-locked\""
        );
        let kind: ErrorKind = serde_json::from_str("\"writer-disabled\"").unwrap();
        assert_eq!(kind, ErrorKind::WriterDisabled);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::SemaphoreUnavailable.retryable());
        assert!(ErrorKind::RateLimited.retryable());
        assert!(!ErrorKind::SemaphoreNotHeld.retryable());
        assert!(!ErrorKind::InvalidInput.retryable());
    }

    #[test]
    fn test_contention_error_names_holder() {
        let body: ErrorBody = LockError::Unavailable {
            holder: "writer1".to_string(),
        }
        .into();

        assert_eq!(body.kind, ErrorKind::SemaphoreUnavailable);
        assert!(body.message.contains("writer1"));
        assert_eq!(body.retry_after, Some(1));
    }

    #[test]
    fn test_account_locked_carries_remainder() {
        let body: ErrorBody = IdentityError::AccountLocked {
            retry_after_secs: 897,
        }
        .into();

        assert_eq!(body.kind, ErrorKind::AccountLocked);
        assert_eq!(body.retry_after, Some(897));
    }

    #[test]
    fn test_envelope_shape() {
        let ok = Envelope::success(serde_json::json!({"id": 1}));
        let json: Value = serde_json::from_str(&ok.to_json()).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"]["id"], 1);
        assert!(json.get("error").is_none());

        let err = Envelope::failure(ErrorBody::new(ErrorKind::NotFound, "message not found"));
        let json: Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "not-found");
        assert!(json.get("data").is_none());
    }
}
