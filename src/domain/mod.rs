pub mod job;

pub use job::{
    validate_error_message, validate_job, validate_payload, validate_request_id, Job, JobStatus,
    ValidationError, MAX_ERROR_LEN,
};
