//! Read-through, write-invalidate cache of job records (SPEC_FULL.md §4.5).
//!
//! No teacher module maps onto this directly; it is sized and structured as a small
//! best-effort collaborator the way the rest of this codebase treats out-of-band
//! infrastructure — a cache failure or miss must never surface as an API error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::domain::{Job, JobStatus};

/// Terminal entries outlive non-terminal ones by this factor: a completed job's
/// status rarely changes again, so it is worth caching longer.
const TERMINAL_TTL_FACTOR: u32 = 12;

struct Entry {
    job: Job,
    expires_at: Instant,
}

/// In-memory status cache keyed by `request_id`. Safe for concurrent use.
pub struct StatusCache {
    ttl_non_terminal: Duration,
    ttl_terminal: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl StatusCache {
    pub fn new(ttl_non_terminal: Duration) -> Self {
        Self {
            ttl_non_terminal,
            ttl_terminal: ttl_non_terminal * TERMINAL_TTL_FACTOR,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn ttl_for(&self, status: JobStatus) -> Duration {
        if status.is_terminal() {
            self.ttl_terminal
        } else {
            self.ttl_non_terminal
        }
    }

    pub async fn get(&self, request_id: &str) -> Option<Job> {
        let mut entries = self.entries.lock().await;
        match entries.get(request_id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.job.clone()),
            Some(_) => {
                entries.remove(request_id);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, job: Job) {
        let ttl = self.ttl_for(job.status);
        let mut entries = self.entries.lock().await;
        entries.insert(
            job.request_id.clone(),
            Entry {
                job,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn invalidate(&self, request_id: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(request_id);
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
