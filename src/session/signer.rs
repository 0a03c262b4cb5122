//! # Token Signing
//!
//! Claims layout, the `TokenSigner` collaborator interface, and the HS256
//! implementation. Tokens are self-describing and stateless; revocation is
//! by expiry only.

use base64::Engine;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::Role;

use super::errors::{SessionError, SessionResult};

/// Claims carried inside every bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject username
    pub sub: String,

    /// Role at issue time; re-checked against the registry on every use
    pub role: Role,

    /// Issued-at (Unix epoch seconds)
    pub iat: i64,

    /// Expiry (Unix epoch seconds)
    pub exp: i64,

    /// Unique token id
    pub jti: String,
}

/// Token signing collaborator.
pub trait TokenSigner: Send + Sync {
    /// Sign claims into an opaque bearer token
    fn sign(&self, claims: &Claims) -> SessionResult<String>;

    /// Verify a token and return its claims.
    ///
    /// Expiry is checked here; registry checks are the authority's job.
    fn verify(&self, token: &str) -> SessionResult<Claims>;
}

/// HS256 implementation of [`TokenSigner`]
pub struct JwtTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtTokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl TokenSigner for JwtTokenSigner {
    fn sign(&self, claims: &Claims) -> SessionResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|_| SessionError::SigningFailed)
    }

    fn verify(&self, token: &str) -> SessionResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::TokenExpired,
                _ => SessionError::TokenInvalid,
            }
        })?;

        Ok(data.claims)
    }
}

/// Generate a random 128-bit token id, URL-safe base64 encoded.
pub fn generate_token_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Short, stable fingerprint of a token, safe to put in logs.
///
/// Never log the token itself.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
    encoded[..12].to_string()
}
