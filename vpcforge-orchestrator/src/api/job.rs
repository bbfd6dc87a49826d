//! Job API Handlers
//!
//! HTTP endpoints for submitting provisioning jobs and reading their state.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use vpcforge_core::domain::job::Job;
use vpcforge_core::dto::job::JobAccepted;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::job_service;

/// POST /vpc
/// Accept a VPC provisioning request and start its workflow
///
/// The body is parsed here rather than through the `Json` extractor so that
/// every malformed request gets the same `{"error": ...}` shape.
pub async fn create_job(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let body = parse_body(&body)?;

    let accepted =
        job_service::create_job(state.store.as_ref(), state.trigger.as_ref(), body).await?;

    tracing::info!("Job {} accepted", accepted.job_id);

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /vpc/{job_id}
/// Get the current record of a job
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Fetching job: {}", job_id);

    let job = job_service::get_job(state.store.as_ref(), &job_id).await?;

    Ok(Json(job))
}

/// GET /vpc
/// A job id is required to read a job
pub async fn missing_job_id() -> ApiError {
    ApiError::BadRequest("Missing job_id path parameter".to_string())
}

fn parse_body(body: &[u8]) -> ApiResult<Value> {
    // An empty body is reported as a missing field, not as bad JSON
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    serde_json::from_slice(body).map_err(|_| {
        ApiError::BadRequest("The request body is incorrectly formatted (invalid JSON).".to_string())
    })
}
