//! Job handlers: list, toggle, run-now, and the worker-facing queue and
//! run report endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::{debug, info};

use super::AppState;
use crate::api::error::ApiError;
use crate::api::types::{ClaimRequest, ClaimResponse, ReportRunRequest, RunNowRequest, ToggleJobRequest};
use crate::dispatch::RunAcceptance;
use crate::registry::Job;
use crate::runs::{RunRecord, RunStatus};

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.registry.list_jobs())
}

pub async fn toggle_job(
    State(state): State<AppState>,
    payload: Result<Json<ToggleJobRequest>, JsonRejection>,
) -> Result<Json<Job>, ApiError> {
    let Json(request) = payload?;
    debug!("HTTP toggle request: {} -> {}", request.job_id, request.enabled);
    let job = state.registry.toggle_job(&request.job_id, request.enabled)?;
    Ok(Json(job))
}

pub async fn run_now(
    State(state): State<AppState>,
    payload: Result<Json<RunNowRequest>, JsonRejection>,
) -> Result<Json<RunAcceptance>, ApiError> {
    let Json(request) = payload?;
    let acceptance = state
        .dispatcher
        .run_now(&request.scope, &request.mode, request.since)?;
    info!(
        "Run-now '{}' ({}) accepted {} job(s)",
        request.scope,
        acceptance.mode,
        acceptance.accepted_job_ids.len()
    );
    Ok(Json(acceptance))
}

pub async fn run_all_daily(
    State(state): State<AppState>,
) -> Result<Json<RunAcceptance>, ApiError> {
    Ok(Json(state.dispatcher.run_all_daily()?))
}

/// Hands queued work units to an external worker.
pub async fn claim_work(
    State(state): State<AppState>,
    query: Result<Query<ClaimRequest>, QueryRejection>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let Query(request) = query?;
    if request.max == 0 {
        return Err(ApiError::bad_request("max must be at least 1"));
    }
    let units = state.queue.claim(request.max);
    if !units.is_empty() {
        debug!("Worker claimed {} work unit(s)", units.len());
    }
    Ok(Json(ClaimResponse {
        units,
        remaining: state.queue.len(),
    }))
}

pub async fn report_run(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<ReportRunRequest>, JsonRejection>,
) -> Result<Json<RunRecord>, ApiError> {
    let Path(run_id) = path?;
    let Json(request) = payload?;
    let status: RunStatus = request.status.parse()?;
    let record = state.status.report_run(&run_id, status, request.error)?;
    Ok(Json(record))
}
