//! # Message Service
//!
//! CRUD over the shared message log, gated by writer-lock ownership. The
//! service exclusively owns the set of messages; everything else reads
//! through its operations.

pub mod errors;
pub mod model;
pub mod service;

pub use errors::{MessageError, MessageResult};
pub use model::{Message, BODY_MAX_LEN};
pub use service::{MessageService, MessageUpdate};
