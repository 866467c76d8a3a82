//! Vendor webhook intake (SPEC_FULL.md §4.8).

use axum::{Json, extract::Path, extract::State, response::IntoResponse};

use super::{
    models::{WebhookRequest, WebhookResponse},
    state::AppState,
};
use crate::api::error::ApiError;
use crate::domain::JobStatus;

fn parse_status(status: Option<&str>) -> Result<JobStatus, ApiError> {
    match status.unwrap_or("complete") {
        "complete" => Ok(JobStatus::Complete),
        "failed" => Ok(JobStatus::Failed),
        other => Err(ApiError::InvalidStatus(other.to_string())),
    }
}

/// `POST /vendor-webhook/:vendor` — reconciles an async vendor's callback with the
/// job it answers. An unknown `requestId` is reported as a 400 rather than a 5xx so a
/// retrying vendor is not led to believe the service is unhealthy (SPEC_FULL.md §7).
pub async fn vendor_webhook(
    State(state): State<AppState>,
    Path(_vendor): Path<String>,
    Json(body): Json<WebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.request_id.trim().is_empty() {
        return Err(ApiError::MissingRequestId);
    }
    let status = parse_status(body.status.as_deref())?;

    match state
        .store
        .update_result(&body.request_id, status, body.result, body.error)
    {
        Ok(()) => {}
        Err(crate::store::StoreError::NotFound(id)) => {
            return Err(ApiError::UnknownJob(id));
        }
        Err(other) => return Err(other.into()),
    }

    state.cache.invalidate(&body.request_id).await;

    Ok((axum::http::StatusCode::OK, Json(WebhookResponse { success: true })))
}
