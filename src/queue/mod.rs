//! Durable job queue with consumer-group semantics (SPEC_FULL.md §4.4).

pub mod error;
pub mod fjall_queue;

pub use error::{QueueError, Result};
pub use fjall_queue::{JobQueue, Message, VISIBILITY_TIMEOUT};
