//! Job dispatch worker loop (SPEC_FULL.md §4.7).
//!
//! Consumes from the `"workers"` consumer group, picks a vendor per job, dispatches
//! through the vendor client, and finalizes the job unless it went async to a vendor
//! (a webhook or the timeout sweeper finalizes those later). Grounded on the shape of
//! this codebase's old download worker loop (`worker::runner`), reimplemented against
//! the job store/queue/vendor client rather than the removed Iggy broker.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::StatusCache;
use crate::domain::JobStatus;
use crate::observability::Metrics;
use crate::queue::JobQueue;
use crate::store::{JobStore, StoreError};
use crate::vendor::{CallStatus, VendorClient, VendorError};

pub const CONSUMER_GROUP: &str = "workers";
const CONSUMER_NAME: &str = "worker-1";
const CONSUME_BATCH: usize = 10;
const BLOCK_FOR: Duration = Duration::from_secs(5);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub sync_vendor: String,
    pub async_vendor: String,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Vendor(#[from] VendorError),
}

pub struct Worker {
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    cache: Arc<StatusCache>,
    vendors: Arc<VendorClient>,
    metrics: Arc<Metrics>,
    config: WorkerConfig,
}

/// Picks the vendor for a job: `"type": "sync"` or an absent `type` routes to the
/// sync vendor, everything else (including unrecognized values) goes async.
pub fn select_vendor(payload: &serde_json::Value, config: &WorkerConfig) -> String {
    let is_async = payload
        .get("type")
        .and_then(|v| v.as_str())
        .map(|t| t != "sync")
        .unwrap_or(false);
    if is_async {
        config.async_vendor.clone()
    } else {
        config.sync_vendor.clone()
    }
}

impl Worker {
    pub fn new(
        store: Arc<JobStore>,
        queue: Arc<JobQueue>,
        cache: Arc<StatusCache>,
        vendors: Arc<VendorClient>,
        metrics: Arc<Metrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            cache,
            vendors,
            metrics,
            config,
        }
    }

    /// Runs until `shutdown` is cancelled, consuming jobs and dispatching them.
    /// Errors handling a single message are logged and the loop continues after a
    /// short backoff rather than tearing the worker down.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            let consumed = tokio::select! {
                result = self.queue.consume(CONSUMER_GROUP, CONSUMER_NAME, CONSUME_BATCH, BLOCK_FOR) => result,
                _ = shutdown.cancelled() => {
                    info!("worker shutting down");
                    return;
                }
            };

            let messages = match consumed {
                Ok(messages) => messages,
                Err(err) => {
                    error!(error = %err, "failed to consume from job queue");
                    tokio::select! {
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {},
                        _ = shutdown.cancelled() => return,
                    }
                    continue;
                }
            };

            for message in messages {
                if let Err(err) = self.handle_message(&message.request_id).await {
                    error!(request_id = %message.request_id, error = %err, "failed to process job");
                }
                if let Err(err) = self.queue.ack(CONSUMER_GROUP, &message.message_id) {
                    error!(message_id = %message.message_id, error = %err, "failed to ack message");
                }
            }
        }
    }

    async fn handle_message(&self, request_id: &str) -> Result<(), WorkerError> {
        let job = match self.store.find_by_id(request_id)? {
            Some(job) => job,
            None => {
                warn!(request_id, "job referenced by queue message not found in store");
                return Ok(());
            }
        };

        if job.status.is_terminal() {
            info!(request_id, "job already terminal, skipping dispatch");
            return Ok(());
        }

        let vendor = select_vendor(&job.payload, &self.config);
        self.store
            .update_status(request_id, JobStatus::Processing, Some(&vendor))?;
        self.cache.invalidate(request_id).await;

        let response = self.vendors.call(&vendor, &job.payload, request_id).await?;
        self.metrics.vendor_call(response.status == CallStatus::Success);

        match response.status {
            CallStatus::Error => {
                self.store
                    .update_result(request_id, JobStatus::Failed, None, response.error)?;
                self.metrics.job_failed();
            }
            CallStatus::Success if response.is_async => {
                info!(request_id, vendor, "dispatched to async vendor, awaiting webhook");
            }
            CallStatus::Success => {
                self.store
                    .update_result(request_id, JobStatus::Complete, response.data, None)?;
                self.metrics.job_completed();
            }
        }

        if let Some(job) = self.store.find_by_id(request_id)? {
            self.cache.put(job).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> WorkerConfig {
        WorkerConfig {
            sync_vendor: "syncVendor".to_string(),
            async_vendor: "asyncVendor".to_string(),
        }
    }

    #[test]
    fn absent_type_selects_sync_vendor() {
        assert_eq!(select_vendor(&json!({}), &config()), "syncVendor");
    }

    #[test]
    fn explicit_sync_selects_sync_vendor() {
        assert_eq!(select_vendor(&json!({"type": "sync"}), &config()), "syncVendor");
    }

    #[test]
    fn explicit_async_selects_async_vendor() {
        assert_eq!(select_vendor(&json!({"type": "async"}), &config()), "asyncVendor");
    }

    #[test]
    fn unrecognized_type_selects_async_vendor() {
        assert_eq!(select_vendor(&json!({"type": "bogus"}), &config()), "asyncVendor");
    }
}
