//! # Identity Registry
//!
//! Principal records, credential verification, and the lockout counter.
//! The registry exclusively owns all `Principal` records; other components
//! see only summaries.

pub mod errors;
pub mod hasher;
pub mod principal;
pub mod registry;

pub use errors::{IdentityError, IdentityResult};
pub use hasher::{Argon2PasswordHasher, PasswordHasher};
pub use principal::{Principal, PrincipalSummary, Role};
pub use registry::IdentityRegistry;
