//! Request-level validation ahead of domain validation (SPEC_FULL.md §6, §8 Boundaries).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("request body must be a non-null JSON object")]
    NotAnObject,
    #[error("request body must not be empty")]
    Empty,
}

/// Spec §6: `POST /jobs` accepts "arbitrary non-empty JSON object".
pub fn validate_job_payload(payload: &serde_json::Value) -> Result<(), RequestValidationError> {
    match payload {
        serde_json::Value::Object(map) if map.is_empty() => Err(RequestValidationError::Empty),
        serde_json::Value::Object(_) => Ok(()),
        _ => Err(RequestValidationError::NotAnObject),
    }
}
