//! Progress handlers: start, poll and control the active operation, plus
//! task reports from the execution layer.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use tracing::debug;

use super::AppState;
use crate::api::error::ApiError;
use crate::api::types::StartOperationRequest;
use crate::error::ControlError;
use crate::progress::{OperationSummary, ProgressSnapshot, Region, Task, TaskUpdate};

pub async fn start_operation(
    State(state): State<AppState>,
    payload: Result<Json<StartOperationRequest>, JsonRejection>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let Json(request) = payload?;
    let unknown: Vec<&str> = request
        .job_ids
        .iter()
        .filter(|id| !state.registry.contains(id))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(ControlError::Validation(format!(
            "Unknown job id(s) for operation: {}",
            unknown.join(", ")
        ))
        .into());
    }

    let snapshot = state
        .tracker
        .start_operation(request.regions, request.job_ids)?;
    Ok(Json(snapshot))
}

pub async fn progress_status(
    State(state): State<AppState>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    Ok(Json(state.tracker.status()?))
}

pub async fn update_task(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(task_id) = path?;
    let Json(update) = payload?;
    debug!("Task update {}: {:.1}%", task_id, update.progress);
    Ok(Json(state.tracker.update_task(&task_id, update)?))
}

pub async fn pause_operation(
    State(state): State<AppState>,
) -> Result<Json<OperationSummary>, ApiError> {
    Ok(Json(state.tracker.pause()?))
}

pub async fn resume_operation(
    State(state): State<AppState>,
) -> Result<Json<OperationSummary>, ApiError> {
    Ok(Json(state.tracker.resume()?))
}

pub async fn cancel_operation(
    State(state): State<AppState>,
) -> Result<Json<OperationSummary>, ApiError> {
    Ok(Json(state.tracker.cancel()?))
}

pub async fn skip_task(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(task_id) = path?;
    Ok(Json(state.tracker.skip_task(&task_id)?))
}

pub async fn skip_region(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Region>, ApiError> {
    let Path(region_code) = path?;
    Ok(Json(state.tracker.skip_region(&region_code)?))
}
