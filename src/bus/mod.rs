//! # Event Bus
//!
//! Process-local, in-memory fan-out of committed events to live
//! subscribers. Publication is non-blocking for publishers; each
//! subscription owns a bounded FIFO that drops its oldest entry (and turns
//! sticky-lossy) rather than ever stalling a lock transition.

pub mod errors;
pub mod event;
pub mod fanout;
pub mod subscriber;

pub use errors::{BusError, BusResult};
pub use event::{Event, WriterTransition};
pub use fanout::EventBus;
pub use subscriber::{Delivery, Subscription};
