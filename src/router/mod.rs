//! # Command Router
//!
//! The composition point. Binds bearer tokens to component operations,
//! translates component outcomes into the uniform response envelope, keeps
//! per-principal presence, and is the only place that knows about the
//! external transport.

pub mod command;
pub mod errors;
pub mod presence;
pub mod response;
pub mod router;

pub use command::{Command, CommandRequest};
pub use errors::{BuildError, BuildResult};
pub use presence::{PresenceState, PresenceTracker};
pub use response::{Envelope, ErrorBody, ErrorKind};
pub use router::CommandRouter;
