//! # Router Construction Errors

use thiserror::Error;

/// Result type for building the router
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors while wiring the service together at startup
#[derive(Debug, Error)]
pub enum BuildError {
    /// Store could not be opened
    #[error("Failed to open store: {0}")]
    Store(String),

    /// Identity registry could not be initialized
    #[error("Failed to initialize identity registry: {0}")]
    Identity(String),

    /// Seed admin could not be registered
    #[error("Failed to seed admin principal: {0}")]
    SeedAdmin(String),
}
