//! # Observability
//!
//! Structured operational logging for the service core.
//!
//! Audit history is a separate concern (see `crate::audit`): the audit log is
//! part of the service's externally visible state, while these logs are for
//! operators only and carry no delivery guarantee.

pub mod logger;

pub use logger::{Logger, Severity};
