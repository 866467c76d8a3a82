use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a job's error string (spec: requestId/payload/error invariants).
pub const MAX_ERROR_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    /// True if no further status transition is expected absent a webhook/ack redelivery.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition in the job lifecycle DAG.
    /// Terminal self-loops are allowed (idempotent webhook redelivery).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Processing, Complete) | (Processing, Failed) => true,
            (Complete, Complete) | (Failed, Failed) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }
}

/// A job record as persisted by the job store. See SPEC_FULL.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub request_id: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vendor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new_pending(request_id: String, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            request_id,
            status: JobStatus::Pending,
            payload,
            result: None,
            error: None,
            vendor: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("request_id '{0}' is not a valid UUID")]
    InvalidRequestId(String),
    #[error("payload must be a non-null JSON object")]
    InvalidPayload,
    #[error("error message exceeds {MAX_ERROR_LEN} characters ({0} given)")]
    ErrorTooLong(usize),
    #[error("status complete requires exactly one of result/error")]
    CompleteNeedsResultXorError,
    #[error("status failed requires an error message")]
    FailedNeedsError,
    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
}

/// Validates the request_id format used as the job's primary key.
pub fn validate_request_id(request_id: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(request_id)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidRequestId(request_id.to_string()))
}

/// Validates that a submitted payload is a non-null, non-scalar JSON object.
pub fn validate_payload(payload: &serde_json::Value) -> Result<(), ValidationError> {
    match payload {
        serde_json::Value::Object(_) => Ok(()),
        _ => Err(ValidationError::InvalidPayload),
    }
}

/// Validates the error string length invariant.
pub fn validate_error_message(error: &str) -> Result<(), ValidationError> {
    if error.chars().count() > MAX_ERROR_LEN {
        return Err(ValidationError::ErrorTooLong(error.chars().count()));
    }
    Ok(())
}

/// Validates the full job record against the §3 invariants, as enforced by the store
/// at `create`/`updateResult` time.
pub fn validate_job(job: &Job) -> Result<(), ValidationError> {
    validate_request_id(&job.request_id)?;
    validate_payload(&job.payload)?;
    if let Some(error) = &job.error {
        validate_error_message(error)?;
    }
    match job.status {
        JobStatus::Complete => {
            if job.result.is_some() == job.error.is_some() {
                return Err(ValidationError::CompleteNeedsResultXorError);
            }
        }
        JobStatus::Failed => {
            if job.error.is_none() {
                return Err(ValidationError::FailedNeedsError);
            }
        }
        _ => {}
    }
    Ok(())
}
