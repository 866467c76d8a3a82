//! Retention policy: jobs older than 30 days are eligible for deletion, but only once
//! terminal (spec §3: "expiration must not remove a job that is not terminal").

use chrono::{Duration as ChronoDuration, Utc};
use fjall::PartitionHandle;
use tracing::info;

use crate::domain::{Job, JobStatus};

use super::error::Result;
use super::keys::{decode_job_key, encode_status_prefix, encode_vendor_prefix};

pub const RETENTION_JOBS_DAYS: i64 = 30;

#[derive(Debug, Default, Clone, Copy)]
pub struct PruneStats {
    pub jobs_pruned: usize,
}

/// Scans the `jobs` partition and removes terminal jobs whose `created_at` is older
/// than [`RETENTION_JOBS_DAYS`], along with their status/vendor index entries.
pub fn prune_expired(
    jobs: &PartitionHandle,
    by_status: &PartitionHandle,
    by_vendor: &PartitionHandle,
) -> Result<PruneStats> {
    let cutoff = Utc::now() - ChronoDuration::days(RETENTION_JOBS_DAYS);
    let mut stats = PruneStats::default();

    let mut to_remove = Vec::new();
    for item in jobs.iter() {
        let (key, value) = item?;
        let job: Job = serde_json::from_slice(&value)?;
        if job.status.is_terminal() && job.created_at < cutoff {
            to_remove.push((key.to_vec(), job));
        }
    }

    for (key, job) in to_remove {
        jobs.remove(&key)?;
        if let Some(request_id) = decode_job_key(&key) {
            prune_index_entries(by_status, &request_id, job.status)?;
            if let Some(vendor) = &job.vendor {
                prune_vendor_entries(by_vendor, &request_id, vendor)?;
            }
        }
        stats.jobs_pruned += 1;
    }

    info!(pruned = stats.jobs_pruned, "pruned expired jobs");
    Ok(stats)
}

fn prune_index_entries(
    by_status: &PartitionHandle,
    request_id: &str,
    status: JobStatus,
) -> Result<()> {
    let status_str = status_str(status);
    let prefix = encode_status_prefix(status_str);
    for item in by_status.prefix(&prefix) {
        let (key, value) = item?;
        if value.as_ref() == request_id.as_bytes() {
            by_status.remove(&key)?;
        }
    }
    Ok(())
}

fn prune_vendor_entries(by_vendor: &PartitionHandle, request_id: &str, vendor: &str) -> Result<()> {
    let prefix = encode_vendor_prefix(vendor);
    for item in by_vendor.prefix(&prefix) {
        let (key, value) = item?;
        if value.as_ref() == request_id.as_bytes() {
            by_vendor.remove(&key)?;
        }
    }
    Ok(())
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Processing => "processing",
        JobStatus::Complete => "complete",
        JobStatus::Failed => "failed",
    }
}
