//! HTTP request and response bodies.
//!
//! Domain types (jobs, tasks, snapshots, run records) are serialized as-is;
//! only envelopes and request payloads live here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dispatch::WorkUnit;
use crate::progress::RegionSpec;
use crate::runs::NewLogLine;

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleJobRequest {
    pub job_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunNowRequest {
    pub scope: String,
    pub mode: String,
    /// Backfill start, bootstrap runs only.
    #[serde(default)]
    pub since: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOperationRequest {
    pub regions: Vec<RegionSpec>,
    /// Registry jobs driven by this operation.
    #[serde(default)]
    pub job_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendLogsRequest {
    pub lines: Vec<NewLogLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendLogsResponse {
    pub success: bool,
    pub appended: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRunRequest {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Maximum number of work units to hand out (default: 1)
    #[serde(default = "default_claim_max")]
    pub max: usize,
}

fn default_claim_max() -> usize {
    1
}

impl Default for ClaimRequest {
    fn default() -> Self {
        Self {
            max: default_claim_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub units: Vec<WorkUnit>,
    /// Units still waiting after this claim.
    pub remaining: usize,
}
