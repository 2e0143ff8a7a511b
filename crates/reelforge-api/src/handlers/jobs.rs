//! Job submission, query and cancellation handlers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use reelforge_models::{estimate_cost, JobId, JobInput, JobSnapshot};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Request body for job submission.
///
/// The payload variant is selected by its `kind` tag.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(flatten)]
    pub input: JobInput,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job: JobSnapshot,
    pub cost: u32,
    pub balance: i64,
}

/// Submit a job: validate, estimate, debit, create.
///
/// The debit happens before the job record exists, so an insufficient
/// balance never leaves a job behind.
pub async fn submit_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SubmitJobRequest>,
) -> ApiResult<Json<SubmitJobResponse>> {
    req.input.validate()?;
    let cost = estimate_cost(&req.input);
    let job_type = req.input.job_type();

    let mut metadata = HashMap::new();
    metadata.insert("job_type".to_string(), job_type.as_str().to_string());
    let receipt = state
        .ledger
        .spend(
            &user.user_id,
            cost,
            format!("{job_type} job"),
            Some(metadata),
        )
        .await?;

    let job = state
        .store
        .create(&user.user_id, req.project_id, req.input)
        .await;
    metrics::record_job_submitted(job_type.as_str(), cost);

    Ok(Json(SubmitJobResponse {
        job: job.snapshot(),
        cost,
        balance: receipt.new_balance,
    }))
}

/// Get one job, ownership-checked.
pub async fn get_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = fetch_owned(&state, &user, &job_id).await?;
    Ok(Json(job.snapshot()))
}

/// List the caller's jobs, most recently updated first.
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<JobSnapshot>>> {
    Ok(Json(state.store.list_for_user(&user.user_id).await))
}

/// Cancel a pending or processing job.
pub async fn cancel_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = fetch_owned(&state, &user, &job_id).await?;
    state.store.cancel(&job.id).await?;
    metrics::record_job_cancelled(job.job_type.as_str());

    let cancelled = state
        .store
        .get(&job.id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(cancelled.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    #[serde(flatten)]
    pub input: JobInput,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub cost: u32,
}

/// Pure cost estimation; touches neither the ledger nor the store.
pub async fn estimate(
    Json(req): Json<EstimateRequest>,
) -> ApiResult<Json<EstimateResponse>> {
    req.input.validate()?;
    Ok(Json(EstimateResponse {
        cost: estimate_cost(&req.input),
    }))
}

/// Fetch a job the caller owns. Foreign jobs read as not found so ids
/// don't leak across users.
async fn fetch_owned(
    state: &AppState,
    user: &AuthUser,
    job_id: &str,
) -> ApiResult<reelforge_models::Job> {
    let id = JobId::from_string(job_id.to_string());
    let job = state
        .store
        .get(&id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    if job.user_id != user.user_id {
        return Err(ApiError::not_found("Job not found"));
    }
    Ok(job)
}
