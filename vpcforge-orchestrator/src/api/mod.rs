//! API Module
//!
//! HTTP front end of the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::error::{ApiError, INTERNAL_SERVER_ERROR};
use crate::repository::JobStore;
use crate::trigger::JobTrigger;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub trigger: Arc<dyn JobTrigger>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/vpc", post(job::create_job).get(job::missing_job_id))
        .route("/vpc/", get(job::missing_job_id))
        .route("/vpc/{job_id}", get(job::get_job))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state);

    with_middleware(routes)
}

fn with_middleware(router: Router) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": INTERNAL_SERVER_ERROR })),
    )
        .into_response()
}
