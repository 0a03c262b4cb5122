//! # Identity Registry
//!
//! Owns all principal records. Serializes per-principal mutation so the
//! failed-attempt counter and lockout transitions are atomic with the
//! response that reports them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};

use super::errors::{IdentityError, IdentityResult};
use super::hasher::PasswordHasher;
use super::principal::{
    validate_password, validate_username, Principal, PrincipalSummary, Role,
};

/// Registration and authentication over the principal set.
pub struct IdentityRegistry {
    principals: RwLock<HashMap<String, Principal>>,
    hasher: Arc<dyn PasswordHasher>,
    lockout_threshold: u32,
    lockout: Duration,
    /// Pre-computed hash verified on every rejected path so that response
    /// time does not reveal whether a username exists or is locked.
    timing_pad: String,
}

impl IdentityRegistry {
    pub fn new(
        hasher: Arc<dyn PasswordHasher>,
        lockout_threshold: u32,
        lockout_secs: i64,
    ) -> IdentityResult<Self> {
        let timing_pad = hasher.hash("scribelock-timing-pad-0")?;
        Ok(Self {
            principals: RwLock::new(HashMap::new()),
            hasher,
            lockout_threshold,
            lockout: Duration::seconds(lockout_secs),
            timing_pad,
        })
    }

    /// Register a new principal.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> IdentityResult<PrincipalSummary> {
        validate_username(username)?;
        validate_password(password)?;

        // Hash outside the registry lock; uniqueness is re-checked under it.
        let password_hash = self.hasher.hash(password)?;

        let mut principals = self
            .principals
            .write()
            .map_err(|_| IdentityError::Internal("registry lock poisoned".into()))?;

        if principals.contains_key(username) {
            return Err(IdentityError::UsernameTaken);
        }

        let principal = Principal::new(username.to_string(), password_hash, role);
        let summary = principal.summary();
        principals.insert(username.to_string(), principal);

        Ok(summary)
    }

    /// Authenticate a principal by username and password.
    ///
    /// A locked or unknown principal still pays for one hash verification
    /// before the rejection is returned.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> IdentityResult<PrincipalSummary> {
        let now = Utc::now();

        // Snapshot the stored hash without holding the lock across Argon2.
        let stored = {
            let principals = self
                .principals
                .read()
                .map_err(|_| IdentityError::Internal("registry lock poisoned".into()))?;
            principals
                .get(username)
                .map(|p| (p.password_hash.clone(), p.lockout_remaining(now)))
        };

        let (hash, lockout_remaining) = match stored {
            Some(entry) => entry,
            None => {
                let _ = self.hasher.verify(password, &self.timing_pad);
                return Err(IdentityError::InvalidCredentials {
                    lockout_triggered: false,
                });
            }
        };

        if let Some(retry_after_secs) = lockout_remaining {
            let _ = self.hasher.verify(password, &self.timing_pad);
            return Err(IdentityError::AccountLocked { retry_after_secs });
        }

        let verified = self.hasher.verify(password, &hash)?;

        // Bookkeeping is atomic with the response that reports it.
        let mut principals = self
            .principals
            .write()
            .map_err(|_| IdentityError::Internal("registry lock poisoned".into()))?;
        let principal = principals
            .get_mut(username)
            .ok_or(IdentityError::InvalidCredentials {
                lockout_triggered: false,
            })?;

        // A lockout may have landed while the hash was being checked.
        if let Some(retry_after_secs) = principal.lockout_remaining(now) {
            return Err(IdentityError::AccountLocked { retry_after_secs });
        }

        if verified {
            principal.failed_attempts = 0;
            principal.locked_until = None;
            principal.last_login_at = Some(now);
            Ok(principal.summary())
        } else {
            principal.failed_attempts += 1;
            if principal.failed_attempts >= self.lockout_threshold {
                principal.locked_until = Some(now + self.lockout);
                principal.failed_attempts = 0;
                Err(IdentityError::InvalidCredentials {
                    lockout_triggered: true,
                })
            } else {
                Err(IdentityError::InvalidCredentials {
                    lockout_triggered: false,
                })
            }
        }
    }

    /// Look up a principal summary by username.
    pub fn lookup(&self, username: &str) -> IdentityResult<PrincipalSummary> {
        let principals = self
            .principals
            .read()
            .map_err(|_| IdentityError::Internal("registry lock poisoned".into()))?;
        principals
            .get(username)
            .map(Principal::summary)
            .ok_or(IdentityError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.principals.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Test hook: backdate or clear a lockout.
    #[cfg(test)]
    pub fn set_locked_until(&self, username: &str, until: Option<chrono::DateTime<Utc>>) {
        if let Ok(mut principals) = self.principals.write() {
            if let Some(p) = principals.get_mut(username) {
                p.locked_until = until;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap deterministic hasher so lockout tests do not pay for Argon2.
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> IdentityResult<String> {
            Ok(format!("plain:{}", password))
        }

        fn verify(&self, password: &str, hash: &str) -> IdentityResult<bool> {
            Ok(hash == format!("plain:{}", password))
        }
    }

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(Arc::new(PlainHasher), 5, 900).unwrap()
    }

    #[test]
    fn test_register_and_authenticate() {
        let reg = registry();

        let summary = reg.register("alice", "password1", Role::Writer).unwrap();
        assert_eq!(summary.username, "alice");
        assert_eq!(summary.role, Role::Writer);

        let auth = reg.authenticate("alice", "password1").unwrap();
        assert_eq!(auth.username, "alice");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let reg = registry();
        reg.register("alice", "password1", Role::Reader).unwrap();

        assert!(matches!(
            reg.register("alice", "password2", Role::Reader),
            Err(IdentityError::UsernameTaken)
        ));
    }

    #[test]
    fn test_unknown_user_is_invalid_credentials() {
        let reg = registry();
        assert!(matches!(
            reg.authenticate("ghost", "password1"),
            Err(IdentityError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn test_lockout_after_five_failures() {
        let reg = registry();
        reg.register("bob", "password1", Role::Reader).unwrap();

        for i in 1..=4 {
            let err = reg.authenticate("bob", "wrong0").unwrap_err();
            assert!(
                matches!(err, IdentityError::InvalidCredentials { lockout_triggered: false }),
                "attempt {} should fail without lockout",
                i
            );
        }

        // Fifth failure trips the lockout.
        let err = reg.authenticate("bob", "wrong0").unwrap_err();
        assert!(matches!(
            err,
            IdentityError::InvalidCredentials {
                lockout_triggered: true
            }
        ));

        // Sixth attempt with the CORRECT password still fails.
        let err = reg.authenticate("bob", "password1").unwrap_err();
        match err {
            IdentityError::AccountLocked { retry_after_secs } => {
                assert!((1..=900).contains(&retry_after_secs));
            }
            other => panic!("expected AccountLocked, got {:?}", other),
        }
    }

    #[test]
    fn test_lockout_expires() {
        let reg = registry();
        reg.register("bob", "password1", Role::Reader).unwrap();

        for _ in 0..5 {
            let _ = reg.authenticate("bob", "wrong0");
        }
        assert!(matches!(
            reg.authenticate("bob", "password1"),
            Err(IdentityError::AccountLocked { .. })
        ));

        // Backdate the lockout: the account opens again.
        reg.set_locked_until("bob", Some(Utc::now() - Duration::seconds(1)));
        assert!(reg.authenticate("bob", "password1").is_ok());
    }

    #[test]
    fn test_success_resets_counter() {
        let reg = registry();
        reg.register("carol", "password1", Role::Reader).unwrap();

        for _ in 0..4 {
            let _ = reg.authenticate("carol", "wrong0");
        }
        reg.authenticate("carol", "password1").unwrap();

        // Counter was reset; four more failures still do not lock.
        for _ in 0..4 {
            let err = reg.authenticate("carol", "wrong0").unwrap_err();
            assert!(matches!(
                err,
                IdentityError::InvalidCredentials {
                    lockout_triggered: false
                }
            ));
        }
    }

    #[test]
    fn test_lookup() {
        let reg = registry();
        reg.register("dave", "password1", Role::Admin).unwrap();

        let summary = reg.lookup("dave").unwrap();
        assert_eq!(summary.role, Role::Admin);

        assert!(matches!(reg.lookup("ghost"), Err(IdentityError::NotFound)));
    }
}
