//! # Message Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{MessageError, MessageResult};

/// Maximum message body length in characters
pub const BODY_MAX_LEN: usize = 2000;

/// One entry in the chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned, strictly increasing across the service lifetime
    pub id: i64,

    /// Creator; immutable for the life of the message
    pub author: String,

    pub body: String,

    pub created_at: DateTime<Utc>,

    /// Always >= `created_at`
    pub updated_at: DateTime<Utc>,
}

/// Validate a message body: non-empty after trimming, at most 2000 chars.
///
/// Returns the trimmed body that should be stored.
pub fn validate_body(body: &str) -> MessageResult<&str> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(MessageError::InvalidInput(
            "message body must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > BODY_MAX_LEN {
        return Err(MessageError::InvalidInput(format!(
            "message body must be at most {} characters",
            BODY_MAX_LEN
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_boundaries() {
        assert!(validate_body("").is_err()); // 0
        assert_eq!(validate_body("a").unwrap(), "a"); // 1
        assert!(validate_body(&"x".repeat(2000)).is_ok()); // 2000
        assert!(validate_body(&"x".repeat(2001)).is_err()); // 2001
    }

    #[test]
    fn test_body_trimmed_before_checks() {
        assert!(validate_body("   \n\t ").is_err());
        assert_eq!(validate_body("  hi  ").unwrap(), "hi");
    }
}
