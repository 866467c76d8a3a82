//! Periodic timeout sweep for async-vendor jobs stuck in `processing` (SPEC_FULL.md §4.9).
//!
//! Shaped like a cleanup loop: a fixed-interval async loop with a `cleanup`-style
//! single-pass method kept separate from the driving loop so it can be called directly
//! in tests.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::StatusCache;
use crate::domain::JobStatus;
use crate::observability::Metrics;
use crate::store::JobStore;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);
const JOB_TIMEOUT: chrono::Duration = chrono::Duration::minutes(5);
const TIMEOUT_MESSAGE: &str = "Job timed out - no webhook received";

pub struct TimeoutSweeper {
    store: Arc<JobStore>,
    cache: Arc<StatusCache>,
    metrics: Arc<Metrics>,
    async_vendor: String,
    sweep_interval: Duration,
}

impl TimeoutSweeper {
    pub fn new(
        store: Arc<JobStore>,
        cache: Arc<StatusCache>,
        metrics: Arc<Metrics>,
        async_vendor: String,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            async_vendor,
            sweep_interval,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {},
                _ = shutdown.cancelled() => {
                    info!("timeout sweeper shutting down");
                    return;
                }
            }
            if let Err(err) = self.sweep().await {
                warn!(error = %err, "timeout sweep failed");
            }
        }
    }

    /// Fails every `processing` job dispatched to the async vendor whose
    /// `updated_at` is older than the timeout window. Returns the number reclaimed.
    pub async fn sweep(&self) -> Result<usize, crate::store::StoreError> {
        let now = chrono::Utc::now();
        let processing = self.store.find_by_status(JobStatus::Processing, usize::MAX)?;
        let mut reclaimed = 0;

        for job in processing {
            if job.vendor.as_deref() != Some(self.async_vendor.as_str()) {
                continue;
            }
            if now - job.updated_at < JOB_TIMEOUT {
                continue;
            }
            self.store.update_result(
                &job.request_id,
                JobStatus::Failed,
                None,
                Some(TIMEOUT_MESSAGE.to_string()),
            )?;
            self.cache.invalidate(&job.request_id).await;
            reclaimed += 1;
            info!(request_id = %job.request_id, "reclaimed timed-out job");
        }

        if reclaimed > 0 {
            self.metrics.sweeper_reclaimed(reclaimed as u64);
        }

        Ok(reclaimed)
    }
}
