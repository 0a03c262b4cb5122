//! # Password Hashing
//!
//! The `PasswordHasher` collaborator interface and its Argon2id
//! implementation. The registry never sees plaintext beyond these calls.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2,
};

use super::errors::{IdentityError, IdentityResult};

/// Password hashing collaborator.
///
/// `hash` and `verify` may block for tens of milliseconds; callers must not
/// hold the writer-lock critical section across them.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into an opaque, self-describing string
    fn hash(&self, password: &str) -> IdentityResult<String>;

    /// Verify a plaintext password against a stored hash
    fn verify(&self, password: &str, hash: &str) -> IdentityResult<bool>;
}

/// Argon2id implementation of [`PasswordHasher`]
#[derive(Debug, Default)]
pub struct Argon2PasswordHasher;

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> IdentityResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| IdentityError::HashingFailed)
    }

    fn verify(&self, password: &str, hash: &str) -> IdentityResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|_| IdentityError::HashingFailed)?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
