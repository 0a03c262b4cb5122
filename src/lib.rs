//! scribelock - a multi-user chat service with a single writer lock
//!
//! At most one authenticated principal may mutate the shared message log at
//! any instant; any number may read it concurrently. Everything else in this
//! crate (sessions, event fan-out, audit trail, presence) exists to enforce
//! and observe that property.

pub mod audit;
pub mod bus;
pub mod config;
pub mod identity;
pub mod lock;
pub mod messages;
pub mod observability;
pub mod router;
pub mod session;
pub mod store;
