//! # Session Authority
//!
//! Issues and validates stateless bearer tokens, and resolves a token to an
//! authenticated `(principal, role)` pair. Signing is delegated to the
//! `TokenSigner` collaborator; the server keeps no table of issued tokens.

pub mod authority;
pub mod errors;
pub mod signer;

pub use authority::{AuthContext, IssuedToken, SessionAuthority};
pub use errors::{SessionError, SessionResult};
pub use signer::{token_fingerprint, Claims, JwtTokenSigner, TokenSigner};
