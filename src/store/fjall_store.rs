use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use crate::domain::{validate_job, Job, JobStatus, ValidationError};

use super::error::{Result, StoreError};
use super::keys::{
    encode_job_key, encode_status_key, encode_status_prefix, encode_vendor_key,
    encode_vendor_prefix,
};
use super::pruning::{prune_expired, PruneStats};

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Processing => "processing",
        JobStatus::Complete => "complete",
        JobStatus::Failed => "failed",
    }
}

/// Fjall-backed durable store for job records (SPEC_FULL.md §4.3).
#[derive(Clone)]
pub struct JobStore {
    keyspace: Keyspace,
    jobs: PartitionHandle,
    by_status: PartitionHandle,
    by_vendor: PartitionHandle,
    metadata: PartitionHandle,
}

impl JobStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening job store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let by_status = keyspace.open_partition("by_status", PartitionCreateOptions::default())?;
        let by_vendor = keyspace.open_partition("by_vendor", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            jobs,
            by_status,
            by_vendor,
            metadata,
        })
    }

    fn write_indexes(&self, job: &Job) -> Result<()> {
        let status = status_str(job.status);
        self.by_status.insert(
            encode_status_key(status, job.updated_at, &job.request_id),
            job.request_id.as_bytes(),
        )?;
        if let Some(vendor) = &job.vendor {
            self.by_vendor.insert(
                encode_vendor_key(vendor, status, &job.request_id),
                job.request_id.as_bytes(),
            )?;
        }
        Ok(())
    }

    fn clear_indexes_for(&self, old: &Job) -> Result<()> {
        let status = status_str(old.status);
        self.by_status
            .remove(encode_status_key(status, old.updated_at, &old.request_id))?;
        if let Some(vendor) = &old.vendor {
            self.by_vendor
                .remove(encode_vendor_key(vendor, status, &old.request_id))?;
        }
        Ok(())
    }

    /// Inserts a brand-new job. Fails with `DuplicateId` if the request_id already exists.
    pub fn create(&self, job: Job) -> Result<()> {
        validate_job(&job)?;
        let key = encode_job_key(&job.request_id);
        if self.jobs.get(&key)?.is_some() {
            return Err(StoreError::DuplicateId(job.request_id));
        }
        let value = serde_json::to_vec(&job)?;
        self.jobs.insert(&key, value)?;
        self.write_indexes(&job)?;
        debug!(request_id = %job.request_id, "job created");
        Ok(())
    }

    pub fn find_by_id(&self, request_id: &str) -> Result<Option<Job>> {
        let key = encode_job_key(request_id);
        match self.jobs.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Unconditional status write (also used to stamp `vendor` on dispatch).
    pub fn update_status(&self, request_id: &str, status: JobStatus, vendor: Option<&str>) -> Result<()> {
        let mut job = self
            .find_by_id(request_id)?
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        let old = job.clone();
        if !old.status.can_transition_to(status) {
            return Err(ValidationError::IllegalTransition {
                from: old.status,
                to: status,
            }
            .into());
        }
        job.status = status;
        if let Some(vendor) = vendor {
            job.vendor = Some(vendor.to_string());
        }
        job.updated_at = Utc::now();
        validate_job(&job)?;

        self.clear_indexes_for(&old)?;
        self.jobs
            .insert(encode_job_key(request_id), serde_json::to_vec(&job)?)?;
        self.write_indexes(&job)?;
        Ok(())
    }

    /// Writes terminal fields (`result`/`error`) together with the status transition.
    pub fn update_result(
        &self,
        request_id: &str,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<()> {
        let mut job = self
            .find_by_id(request_id)?
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        let old = job.clone();
        if !old.status.can_transition_to(status) {
            return Err(ValidationError::IllegalTransition {
                from: old.status,
                to: status,
            }
            .into());
        }
        job.status = status;
        job.result = result;
        job.error = error;
        job.updated_at = Utc::now();
        validate_job(&job)?;

        self.clear_indexes_for(&old)?;
        self.jobs
            .insert(encode_job_key(request_id), serde_json::to_vec(&job)?)?;
        self.write_indexes(&job)?;
        debug!(request_id, ?status, "job result recorded");
        Ok(())
    }

    pub fn find_by_status(&self, status: JobStatus, limit: usize) -> Result<Vec<Job>> {
        let prefix = encode_status_prefix(status_str(status));
        let mut out = Vec::with_capacity(limit);
        for item in self.by_status.prefix(&prefix).take(limit) {
            let (_, request_id_bytes) = item?;
            let request_id = String::from_utf8_lossy(&request_id_bytes).to_string();
            if let Some(job) = self.find_by_id(&request_id)? {
                out.push(job);
            }
        }
        Ok(out)
    }

    pub fn find_by_vendor(&self, vendor: &str, limit: usize) -> Result<Vec<Job>> {
        let prefix = encode_vendor_prefix(vendor);
        let mut out = Vec::with_capacity(limit);
        for item in self.by_vendor.prefix(&prefix).take(limit) {
            let (_, request_id_bytes) = item?;
            let request_id = String::from_utf8_lossy(&request_id_bytes).to_string();
            if let Some(job) = self.find_by_id(&request_id)? {
                out.push(job);
            }
        }
        Ok(out)
    }

    pub fn find_recent(&self, hours: i64) -> Result<Vec<Job>> {
        let cutoff: DateTime<Utc> = Utc::now() - ChronoDuration::hours(hours);
        let mut out = Vec::new();
        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job: Job = serde_json::from_slice(&value)?;
            if job.created_at >= cutoff {
                out.push(job);
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut total = 0usize;
        let mut by_status = std::collections::HashMap::new();
        let mut by_vendor = std::collections::HashMap::new();
        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job: Job = serde_json::from_slice(&value)?;
            total += 1;
            *by_status.entry(status_str(job.status).to_string()).or_insert(0) += 1;
            if let Some(vendor) = job.vendor {
                *by_vendor.entry(vendor).or_insert(0) += 1;
            }
        }
        Ok(StoreStats {
            total,
            by_status,
            by_vendor,
        })
    }

    pub fn health_check(&self) -> bool {
        self.metadata.get(b"health").is_ok()
    }

    pub fn prune_expired(&self) -> Result<PruneStats> {
        prune_expired(&self.jobs, &self.by_status, &self.by_vendor)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Test-only backdoor for simulating an old `updated_at` without waiting. Not
    /// `#[cfg(test)]`-gated so integration tests outside this crate can reach it too.
    pub fn backdate_for_test(&self, request_id: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let mut job = self
            .find_by_id(request_id)?
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        job.updated_at = updated_at;
        self.jobs
            .insert(encode_job_key(request_id), serde_json::to_vec(&job)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total: usize,
    pub by_status: std::collections::HashMap<String, usize>,
    pub by_vendor: std::collections::HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_store() -> (JobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JobStore::open(dir.path().join("jobs")).unwrap();
        (store, dir)
    }

    fn new_job(id: &str) -> Job {
        Job::new_pending(id.to_string(), json!({"type": "sync"}))
    }

    #[test]
    fn create_and_find_roundtrip() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440000");
        store.create(job.clone()).unwrap();
        let found = store.find_by_id(&job.request_id).unwrap().unwrap();
        assert_eq!(found.request_id, job.request_id);
        assert!(found.updated_at >= found.created_at);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440001");
        store.create(job.clone()).unwrap();
        assert!(matches!(store.create(job), Err(StoreError::DuplicateId(_))));
    }

    #[test]
    fn update_status_stamps_vendor_and_advances_updated_at() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440002");
        store.create(job.clone()).unwrap();
        store
            .update_status(&job.request_id, JobStatus::Processing, Some("syncVendor"))
            .unwrap();
        let found = store.find_by_id(&job.request_id).unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Processing);
        assert_eq!(found.vendor.as_deref(), Some("syncVendor"));
        assert!(found.updated_at >= found.created_at);
    }

    #[test]
    fn update_result_requires_error_for_failed() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440003");
        store.create(job.clone()).unwrap();
        store
            .update_status(&job.request_id, JobStatus::Processing, Some("syncVendor"))
            .unwrap();
        let result = store.update_result(&job.request_id, JobStatus::Failed, None, None);
        assert!(result.is_err());
        store
            .update_result(
                &job.request_id,
                JobStatus::Failed,
                None,
                Some("vendor exploded".to_string()),
            )
            .unwrap();
        let found = store.find_by_id(&job.request_id).unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Failed);
    }

    #[test]
    fn find_by_status_returns_matching_jobs() {
        let (store, _dir) = open_store();
        let a = new_job("550e8400-e29b-41d4-a716-446655440004");
        let b = new_job("550e8400-e29b-41d4-a716-446655440005");
        store.create(a.clone()).unwrap();
        store.create(b.clone()).unwrap();
        let pending = store.find_by_status(JobStatus::Pending, 10).unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn find_by_vendor_after_dispatch() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440006");
        store.create(job.clone()).unwrap();
        store
            .update_status(&job.request_id, JobStatus::Processing, Some("asyncVendor"))
            .unwrap();
        let found = store.find_by_vendor("asyncVendor", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].request_id, job.request_id);
    }

    #[test]
    fn stats_counts_status_and_vendor() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440007");
        store.create(job.clone()).unwrap();
        store
            .update_status(&job.request_id, JobStatus::Processing, Some("syncVendor"))
            .unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.get("processing"), Some(&1));
        assert_eq!(stats.by_vendor.get("syncVendor"), Some(&1));
    }

    #[test]
    fn not_found_on_missing_job() {
        let (store, _dir) = open_store();
        let result = store.update_status("550e8400-e29b-41d4-a716-446655440099", JobStatus::Processing, None);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn rejects_illegal_status_transition() {
        let (store, _dir) = open_store();
        let job = new_job("550e8400-e29b-41d4-a716-446655440008");
        store.create(job.clone()).unwrap();
        let result = store.update_result(&job.request_id, JobStatus::Failed, None, Some("boom".to_string()));
        assert!(matches!(result, Err(StoreError::Validation(_))));
        let found = store.find_by_id(&job.request_id).unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Pending);
    }
}
