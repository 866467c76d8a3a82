use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use crate::domain::ValidationError;
use crate::queue::QueueError;
use crate::store::StoreError;
use crate::vendor::VendorError;

use super::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("request body must be a non-empty JSON object")]
    InvalidPayload,
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("missing requestId")]
    MissingRequestId,
    #[error("unknown requestId: {0}")]
    UnknownJob(String),
    #[error("invalid webhook status '{0}'")]
    InvalidStatus(String),
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::InvalidPayload
            | ApiError::MissingRequestId
            | ApiError::UnknownJob(_)
            | ApiError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidPayload => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::MissingRequestId => "MISSING_REQUEST_ID",
            ApiError::UnknownJob(_) => "UNKNOWN_JOB",
            ApiError::InvalidStatus(_) => "INVALID_STATUS",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(json!(body))).into_response()
    }
}

/// `DuplicateId` and persistent store/queue failures become 500s; the happy-path
/// causes (validation, not-found) are mapped above per spec §7.
impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => ApiError::Validation(err),
            StoreError::NotFound(id) => ApiError::NotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(value: QueueError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<VendorError> for ApiError {
    fn from(value: VendorError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<super::validation::RequestValidationError> for ApiError {
    fn from(_value: super::validation::RequestValidationError) -> Self {
        ApiError::InvalidPayload
    }
}
