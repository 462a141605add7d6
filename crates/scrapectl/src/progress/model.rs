//! Records owned by the progress tracker.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ControlError;

/// Identifies one tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Paused,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Paused => "paused",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
        )
    }

    /// Completed or skipped: nothing left to do and nothing went wrong.
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "skipped" => Ok(TaskStatus::Skipped),
            "paused" => Ok(TaskStatus::Paused),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(ControlError::Validation(format!(
                "Unknown task status '{}'",
                other
            ))),
        }
    }
}

/// Smallest unit of progress-tracked work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub name: String,
    pub region_code: String,
    pub status: TaskStatus,
    /// 0 to 100.
    pub progress: f64,
    pub current_step: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: Option<f64>,
}

impl Task {
    pub(crate) fn new(task_id: String, name: String, region_code: String) -> Self {
        Self {
            task_id,
            name,
            region_code,
            status: TaskStatus::Pending,
            progress: 0.0,
            current_step: String::new(),
            start_time: None,
            end_time: None,
            error_message: None,
            eta: None,
            duration: None,
        }
    }
}

/// A grouping of tasks, typically one per jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub region_code: String,
    pub region_name: String,
    pub status: TaskStatus,
    pub progress: f64,
    /// Execution order.
    pub tasks: Vec<Task>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    /// Set once the operator skipped the whole region.
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl TaskCounts {
    pub(crate) fn add(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Paused => self.paused += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn sum(&self) -> usize {
        self.pending
            + self.running
            + self.paused
            + self.completed
            + self.failed
            + self.skipped
            + self.cancelled
    }
}

/// Region counts. Paused regions count as running; skipped and cancelled
/// regions count as completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl RegionCounts {
    pub(crate) fn add(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running | TaskStatus::Paused => self.running += 1,
            TaskStatus::Completed | TaskStatus::Skipped | TaskStatus::Cancelled => {
                self.completed += 1
            }
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub operation_id: OperationId,
    pub overall_progress: f64,
    pub current_phase: String,
    pub is_paused: bool,
    pub is_cancelled: bool,
    pub start_time: DateTime<Utc>,
    /// Seconds since the operation started, frozen once it ends.
    pub duration: f64,
    pub eta: Option<DateTime<Utc>>,
    pub current_task: Option<String>,
    pub tasks: TaskCounts,
    pub regions: RegionCounts,
}

/// Everything a dashboard poll needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub summary: OperationSummary,
    pub tasks: BTreeMap<String, Task>,
    pub regions: BTreeMap<String, Region>,
}

/// Input for one region of a new operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    pub region_code: String,
    pub region_name: String,
    pub tasks: Vec<TaskSpec>,
}

/// A task is given either by name (its id is derived from the region code
/// and position) or with an explicit id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskSpec {
    Name(String),
    Detailed {
        #[serde(default)]
        task_id: Option<String>,
        name: String,
    },
}

impl TaskSpec {
    pub fn name(&self) -> &str {
        match self {
            TaskSpec::Name(name) => name,
            TaskSpec::Detailed { name, .. } => name,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            TaskSpec::Name(_) => None,
            TaskSpec::Detailed { task_id, .. } => task_id.as_deref(),
        }
    }
}

/// A progress report for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub progress: f64,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TaskUpdate {
    pub fn new(progress: f64, current_step: &str) -> Self {
        Self {
            progress,
            current_step: Some(current_step.to_string()),
            status: None,
            error_message: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error(mut self, message: &str) -> Self {
        self.error_message = Some(message.to_string());
        self
    }
}
