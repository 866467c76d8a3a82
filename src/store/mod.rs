//! Durable persistence for job records (SPEC_FULL.md §4.3).
//!
//! Backed by Fjall, an embedded LSM key-value store, the same engine the rest of this
//! codebase uses for on-disk state. Jobs older than 30 days are eligible for pruning
//! once terminal; see `pruning`.

pub mod error;
pub mod fjall_store;
pub mod keys;
pub mod pruning;

pub use error::{Result, StoreError};
pub use fjall_store::{JobStore, StoreStats};
pub use pruning::{PruneStats, RETENTION_JOBS_DAYS};
