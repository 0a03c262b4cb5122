//! # Session Authority
//!
//! Binds token verification to the identity registry: a token is only as
//! good as the principal behind it, checked on every use.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

use crate::identity::{IdentityError, IdentityRegistry, PrincipalSummary, Role};
use crate::observability::Logger;

use super::errors::{SessionError, SessionResult};
use super::signer::{generate_token_id, token_fingerprint, Claims, TokenSigner};

/// A freshly issued token and its expiry
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The resolved identity behind a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Issues tokens for authenticated principals and resolves bearer tokens
/// back to `(principal, role)`.
pub struct SessionAuthority {
    signer: Arc<dyn TokenSigner>,
    registry: Arc<IdentityRegistry>,
    ttl: Duration,
}

impl SessionAuthority {
    pub fn new(
        signer: Arc<dyn TokenSigner>,
        registry: Arc<IdentityRegistry>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            signer,
            registry,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a token for an authenticated principal.
    pub fn issue(&self, principal: &PrincipalSummary) -> SessionResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: principal.username.clone(),
            role: principal.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: generate_token_id(),
        };

        let token = self.signer.sign(&claims)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Resolve a bearer token to the principal behind it.
    ///
    /// Beyond signature and expiry, the subject must still exist in the
    /// registry and the token role must match the current role.
    pub fn resolve(&self, token: &str) -> SessionResult<AuthContext> {
        let claims = self.signer.verify(token)?;

        let principal = match self.registry.lookup(&claims.sub) {
            Ok(p) => p,
            Err(IdentityError::NotFound) => return Err(SessionError::UserUnknown),
            Err(_) => return Err(SessionError::TokenInvalid),
        };

        if principal.role != claims.role {
            Logger::warn(
                "TOKEN_ROLE_MISMATCH",
                &[
                    ("principal", claims.sub.as_str()),
                    ("token", &token_fingerprint(token)),
                ],
            );
            return Err(SessionError::RoleMismatch);
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(SessionError::TokenInvalid)?;

        Ok(AuthContext {
            username: claims.sub,
            role: claims.role,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityResult, PasswordHasher};
    use crate::session::signer::JwtTokenSigner;

    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> IdentityResult<String> {
            Ok(format!("plain:{}", password))
        }

        fn verify(&self, password: &str, hash: &str) -> IdentityResult<bool> {
            Ok(hash == format!("plain:{}", password))
        }
    }

    fn authority() -> (SessionAuthority, Arc<IdentityRegistry>) {
        let registry =
            Arc::new(IdentityRegistry::new(Arc::new(PlainHasher), 5, 900).unwrap());
        let signer = Arc::new(JwtTokenSigner::new("test-secret"));
        (
            SessionAuthority::new(signer, Arc::clone(&registry), 3600),
            registry,
        )
    }

    #[test]
    fn test_issue_and_resolve() {
        let (authority, registry) = authority();
        let summary = registry.register("alice", "password1", Role::Writer).unwrap();

        let issued = authority.issue(&summary).unwrap();
        let ctx = authority.resolve(&issued.token).unwrap();

        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.role, Role::Writer);
        assert_eq!(ctx.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn test_unknown_subject_rejected() {
        let (authority, _registry) = authority();

        // Token for a principal that was never registered.
        let issued = authority
            .issue(&PrincipalSummary {
                username: "ghost".to_string(),
                role: Role::Reader,
            })
            .unwrap();

        assert!(matches!(
            authority.resolve(&issued.token),
            Err(SessionError::UserUnknown)
        ));
    }

    #[test]
    fn test_role_mismatch_rejected() {
        let (authority, registry) = authority();
        registry.register("alice", "password1", Role::Reader).unwrap();

        // Token claims a role the registry does not grant.
        let issued = authority
            .issue(&PrincipalSummary {
                username: "alice".to_string(),
                role: Role::Admin,
            })
            .unwrap();

        assert!(matches!(
            authority.resolve(&issued.token),
            Err(SessionError::RoleMismatch)
        ));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let (authority, _registry) = authority();
        assert!(matches!(
            authority.resolve("garbage"),
            Err(SessionError::TokenInvalid)
        ));
    }
}
