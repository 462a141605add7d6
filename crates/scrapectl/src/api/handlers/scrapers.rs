//! Read-only scraper status, logs and failure analysis, plus log ingestion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;

use super::AppState;
use crate::api::error::ApiError;
use crate::api::types::{AppendLogsRequest, AppendLogsResponse, LogsQuery};
use crate::runs::LogLine;
use crate::status::{FailureReport, StatusRecord};

pub async fn scraper_status(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<StatusRecord>, ApiError> {
    let Path(id) = path?;
    Ok(Json(state.status.get_status(&id)?))
}

pub async fn scraper_logs(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Vec<LogLine>>, ApiError> {
    let Path(id) = path?;
    let Query(query) = query?;
    Ok(Json(state.status.get_logs(&id, query.limit)?))
}

pub async fn append_logs(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<AppendLogsRequest>, JsonRejection>,
) -> Result<Json<AppendLogsResponse>, ApiError> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let appended = state.status.append_logs(&id, &request.lines)?;
    Ok(Json(AppendLogsResponse {
        success: true,
        appended,
    }))
}

pub async fn failures(State(state): State<AppState>) -> Result<Json<FailureReport>, ApiError> {
    Ok(Json(state.status.get_failures()?))
}
