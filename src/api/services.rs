use axum::{Json, extract::Path, extract::State, http::HeaderMap, response::IntoResponse};
use http_body_util::BodyExt;
use uuid::Uuid;

use super::{
    models::{HealthComponents, HealthResponse, JobAcceptedResponse, JobStatusResponse},
    state::AppState,
};
use crate::api::error::ApiError;
use crate::domain::Job;

/// `POST /jobs` — accepts an arbitrary non-empty JSON object, creates a pending job,
/// enqueues it for the worker, and returns its `request_id` (SPEC_FULL.md §4.3, §6).
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidPayload)?;
    super::utils::parse_content_type(content_type)?;

    let max_payload_bytes = state.config.max_payload_bytes.as_u64() as usize;
    let body_bytes = read_body(body, max_payload_bytes).await?;
    let payload: serde_json::Value =
        serde_json::from_slice(&body_bytes).map_err(|_| ApiError::InvalidPayload)?;
    super::validation::validate_job_payload(&payload)?;

    let request_id = Uuid::new_v4().to_string();
    let job = Job::new_pending(request_id.clone(), payload.clone());
    state.store.create(job)?;
    state.queue.enqueue(&request_id, payload)?;
    state.metrics.job_accepted();

    Ok((
        axum::http::StatusCode::OK,
        Json(JobAcceptedResponse { request_id }),
    ))
}

async fn read_body(body: axum::body::Body, max_payload_bytes: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();
    super::utils::validate_body_size(&data, max_payload_bytes)?;
    Ok(data)
}

/// `GET /jobs/:requestId` — reads through the status cache before falling back to
/// the job store (SPEC_FULL.md §4.5).
pub async fn get_job(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = match state.cache.get(&request_id).await {
        Some(job) => job,
        None => {
            let job = state
                .store
                .find_by_id(&request_id)?
                .ok_or_else(|| ApiError::NotFound(request_id.clone()))?;
            state.cache.put(job.clone()).await;
            job
        }
    };

    Ok((
        axum::http::StatusCode::OK,
        Json(JobStatusResponse {
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            result: job.result,
            error: job.error,
        }),
    ))
}

/// `GET /health` — reports store reachability and a live probe of every vendor.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.store.health_check();
    let vendors = state.vendors.health_check_all().await;
    let all_healthy = database && vendors.values().all(|healthy| *healthy);

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        timestamp: chrono::Utc::now(),
        components: HealthComponents { database, vendors },
    };

    // Spec §6 lists no error status for /health; degraded state is reported in the body.
    (axum::http::StatusCode::OK, Json(response))
}
