//! # Writer Lock
//!
//! The binary mutual-exclusion primitive at the center of the service: at
//! most one principal may hold it, and every message mutation is gated on
//! holding it. The lock exclusively owns its state; transitions are atomic
//! and publish themselves to the audit log and the event bus.

pub mod errors;
pub mod state;
pub mod writer_lock;

pub use errors::{LockError, LockResult};
pub use state::{LockSnapshot, LockStatus, Ownership};
pub use writer_lock::WriterLock;
