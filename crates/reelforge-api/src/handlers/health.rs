//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub pending_jobs: usize,
}

/// Readiness check endpoint (readiness probe).
///
/// State lives in-process, so readiness reduces to the store answering;
/// the pending count doubles as a cheap backlog signal for dashboards.
pub async fn ready(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let pending = state.store.list_pending(usize::MAX).await.len();
    Json(ReadinessResponse {
        status: "ready".to_string(),
        pending_jobs: pending,
    })
}
