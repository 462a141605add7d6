//! Progress tracker for one long-running, multi-region operation.
//!
//! All mutations go through a single mutex and recompute region and
//! operation aggregates before releasing it, so a reader never sees a task
//! change without the matching region and summary change.
//!
//! Pause and cancel are advisory. The execution layer is expected to check
//! `is_paused` / `is_cancelled` between units of work; nothing here stops
//! work that is already running.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::aggregate::{clamp_progress, linear_eta, mean_progress, region_status, seconds_between};
use super::model::{
    OperationId, OperationSummary, ProgressSnapshot, Region, RegionCounts, RegionSpec, Task,
    TaskCounts, TaskStatus, TaskUpdate,
};
use crate::clock::Clock;
use crate::error::ControlError;

const DEFAULT_FAILURE_MESSAGE: &str = "Task failed without an error message";

struct RegionState {
    code: String,
    name: String,
    tasks: Vec<Task>,
    status: TaskStatus,
    progress: f64,
    skipped: bool,
}

struct Operation {
    id: OperationId,
    regions: Vec<RegionState>,
    task_index: HashMap<String, (usize, usize)>,
    region_index: HashMap<String, usize>,
    job_ids: HashSet<String>,
    is_paused: bool,
    is_cancelled: bool,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    overall_progress: f64,
    task_counts: TaskCounts,
    region_counts: RegionCounts,
}

impl Operation {
    fn build(
        specs: Vec<RegionSpec>,
        job_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ControlError> {
        if specs.is_empty() {
            return Err(ControlError::Validation(
                "An operation needs at least one region".to_string(),
            ));
        }

        let mut regions = Vec::with_capacity(specs.len());
        let mut task_index = HashMap::new();
        let mut region_index = HashMap::new();

        for (ri, spec) in specs.into_iter().enumerate() {
            let code = spec.region_code.trim().to_string();
            let name = spec.region_name.trim().to_string();
            if code.is_empty() || name.is_empty() {
                return Err(ControlError::Validation(
                    "Regions need a non-empty code and name".to_string(),
                ));
            }
            if region_index.insert(code.clone(), ri).is_some() {
                return Err(ControlError::Validation(format!(
                    "Duplicate region code '{}'",
                    code
                )));
            }
            if spec.tasks.is_empty() {
                return Err(ControlError::Validation(format!(
                    "Region '{}' has no tasks",
                    code
                )));
            }

            let mut tasks = Vec::with_capacity(spec.tasks.len());
            for (ti, task_spec) in spec.tasks.iter().enumerate() {
                let task_name = task_spec.name().trim().to_string();
                if task_name.is_empty() {
                    return Err(ControlError::Validation(format!(
                        "Task {} in region '{}' has an empty name",
                        ti + 1,
                        code
                    )));
                }
                let task_id = match task_spec.task_id().map(str::trim) {
                    Some("") => {
                        return Err(ControlError::Validation(format!(
                            "Task '{}' has an empty id",
                            task_name
                        )))
                    }
                    Some(id) => id.to_string(),
                    None => format!("{}-{}", code, ti + 1),
                };
                if task_index.insert(task_id.clone(), (ri, ti)).is_some() {
                    return Err(ControlError::Validation(format!(
                        "Duplicate task id '{}'",
                        task_id
                    )));
                }
                tasks.push(Task::new(task_id, task_name, code.clone()));
            }

            regions.push(RegionState {
                code,
                name,
                tasks,
                status: TaskStatus::Pending,
                progress: 0.0,
                skipped: false,
            });
        }

        let mut op = Self {
            id: OperationId::new(),
            regions,
            task_index,
            region_index,
            job_ids: job_ids.into_iter().collect(),
            is_paused: false,
            is_cancelled: false,
            start_time: now,
            end_time: None,
            overall_progress: 0.0,
            task_counts: TaskCounts::default(),
            region_counts: RegionCounts::default(),
        };
        op.recompute(now);
        Ok(op)
    }

    fn is_finished(&self) -> bool {
        self.regions
            .iter()
            .flat_map(|r| r.tasks.iter())
            .all(|t| t.status.is_terminal())
    }

    /// Holds the single active-operation slot.
    fn is_active(&self) -> bool {
        !self.is_cancelled && !self.is_finished()
    }

    fn locate(&self, task_id: &str) -> Result<(usize, usize), ControlError> {
        self.task_index
            .get(task_id)
            .copied()
            .ok_or_else(|| ControlError::not_found("Task", task_id))
    }

    fn ensure_not_cancelled(&self) -> Result<(), ControlError> {
        if self.is_cancelled {
            return Err(ControlError::InvalidState(format!(
                "Operation {} was cancelled",
                self.id
            )));
        }
        Ok(())
    }

    fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.regions.iter_mut().flat_map(|r| r.tasks.iter_mut())
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        let mut task_counts = TaskCounts::default();
        let mut region_counts = RegionCounts::default();
        let mut total_progress = 0.0;

        for region in &mut self.regions {
            region.status = region_status(&region.tasks, region.skipped);
            region.progress = mean_progress(&region.tasks);
            region_counts.add(region.status);
            for task in &region.tasks {
                task_counts.add(task.status);
                total_progress += task.progress;
            }
        }

        self.overall_progress = if task_counts.total == 0 {
            0.0
        } else {
            total_progress / task_counts.total as f64
        };
        self.task_counts = task_counts;
        self.region_counts = region_counts;

        if self.is_cancelled || self.is_finished() {
            self.end_time.get_or_insert(now);
        } else {
            self.end_time = None;
        }
    }

    fn current_task(&self) -> Option<(&RegionState, &Task)> {
        self.regions.iter().find_map(|r| {
            r.tasks
                .iter()
                .find(|t| matches!(t.status, TaskStatus::Running | TaskStatus::Paused))
                .map(|t| (r, t))
        })
    }

    fn current_phase(&self) -> String {
        if self.is_cancelled {
            return "Cancelled".to_string();
        }
        if self.is_finished() {
            return "Finished".to_string();
        }
        if self.is_paused {
            return "Paused".to_string();
        }
        match self.current_task() {
            Some((region, task)) => format!("{}: {}", region.name, task.name),
            None => "Waiting".to_string(),
        }
    }

    fn task_view(task: &Task, now: DateTime<Utc>) -> Task {
        let mut view = task.clone();
        view.duration = task
            .start_time
            .map(|start| seconds_between(start, task.end_time.unwrap_or(now)));
        view.eta = match task.status {
            TaskStatus::Running | TaskStatus::Paused => task
                .start_time
                .and_then(|start| linear_eta(now, start, task.progress / 100.0)),
            _ => None,
        };
        view
    }

    fn region_view(&self, ri: usize, now: DateTime<Utc>) -> Region {
        let region = &self.regions[ri];
        let start_time = region.tasks.iter().filter_map(|t| t.start_time).min();
        let end_time = if region.tasks.iter().all(|t| t.status.is_terminal()) {
            region.tasks.iter().filter_map(|t| t.end_time).max()
        } else {
            None
        };

        Region {
            region_code: region.code.clone(),
            region_name: region.name.clone(),
            status: region.status,
            progress: region.progress,
            tasks: region
                .tasks
                .iter()
                .map(|t| Self::task_view(t, now))
                .collect(),
            start_time,
            end_time,
            duration: start_time.map(|start| seconds_between(start, end_time.unwrap_or(now))),
            skipped: region.skipped,
        }
    }

    fn summary(&self, now: DateTime<Utc>) -> OperationSummary {
        let fraction = self.overall_progress / 100.0;
        let eta = if self.is_cancelled {
            None
        } else if let Some(end) = self.end_time {
            (fraction > 0.0).then_some(end)
        } else {
            linear_eta(now, self.start_time, fraction)
        };

        OperationSummary {
            operation_id: self.id,
            overall_progress: self.overall_progress,
            current_phase: self.current_phase(),
            is_paused: self.is_paused,
            is_cancelled: self.is_cancelled,
            start_time: self.start_time,
            duration: seconds_between(self.start_time, self.end_time.unwrap_or(now)),
            eta,
            current_task: self.current_task().map(|(_, t)| t.task_id.clone()),
            tasks: self.task_counts,
            regions: self.region_counts,
        }
    }

    fn snapshot(&self, now: DateTime<Utc>) -> ProgressSnapshot {
        let mut tasks = BTreeMap::new();
        let mut regions = BTreeMap::new();
        for ri in 0..self.regions.len() {
            let region = self.region_view(ri, now);
            for task in &region.tasks {
                tasks.insert(task.task_id.clone(), task.clone());
            }
            regions.insert(region.region_code.clone(), region);
        }

        ProgressSnapshot {
            summary: self.summary(now),
            tasks,
            regions,
        }
    }
}

#[derive(Default)]
struct TrackerState {
    operations: HashMap<OperationId, Operation>,
    current: Option<OperationId>,
}

impl TrackerState {
    fn current(&self) -> Option<&Operation> {
        self.current.and_then(|id| self.operations.get(&id))
    }

    fn current_mut(&mut self) -> Option<&mut Operation> {
        match self.current {
            Some(id) => self.operations.get_mut(&id),
            None => None,
        }
    }

    fn require_current(&mut self) -> Result<&mut Operation, ControlError> {
        self.current_mut()
            .ok_or_else(|| ControlError::not_found("Operation", "current"))
    }
}

pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    clock: Arc<dyn Clock>,
}

impl ProgressTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Progress tracker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Starts a new operation with every task pending.
    ///
    /// Fails with `Conflict` while the current operation still has unfinished
    /// tasks and was not cancelled. The previous, finished operation is
    /// discarded. `job_ids` links the operation to registry jobs so that the
    /// dispatcher can refuse new runs for them while the operation is paused.
    pub fn start_operation(
        &self,
        regions: Vec<RegionSpec>,
        job_ids: Vec<String>,
    ) -> Result<ProgressSnapshot, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();

        if let Some(current) = state.current() {
            if current.is_active() {
                return Err(ControlError::Conflict(format!(
                    "Operation {} is still active",
                    current.id
                )));
            }
        }

        let op = Operation::build(regions, job_ids, now)?;
        let id = op.id;
        let snapshot = op.snapshot(now);

        state.operations.clear();
        state.operations.insert(id, op);
        state.current = Some(id);

        log::info!(
            "Started operation {} with {} region(s) and {} task(s)",
            id,
            snapshot.summary.regions.total,
            snapshot.summary.tasks.total
        );

        Ok(snapshot)
    }

    pub fn current_operation_id(&self) -> Option<OperationId> {
        self.lock().current
    }

    /// Full state of the current operation.
    pub fn status(&self) -> Result<ProgressSnapshot, ControlError> {
        let now = self.clock.now();
        let state = self.lock();
        state
            .current()
            .map(|op| op.snapshot(now))
            .ok_or_else(|| ControlError::not_found("Operation", "current"))
    }

    /// Full state of an operation by id.
    pub fn operation(&self, id: OperationId) -> Result<ProgressSnapshot, ControlError> {
        let now = self.clock.now();
        let state = self.lock();
        state
            .operations
            .get(&id)
            .map(|op| op.snapshot(now))
            .ok_or_else(|| ControlError::not_found("Operation", id.to_string()))
    }

    pub fn summary(&self) -> Result<OperationSummary, ControlError> {
        let now = self.clock.now();
        let state = self.lock();
        state
            .current()
            .map(|op| op.summary(now))
            .ok_or_else(|| ControlError::not_found("Operation", "current"))
    }

    /// Applies a progress report from the execution layer.
    ///
    /// Progress is clamped to [0, 100]. Tasks cannot be paused one by one
    /// (`Validation`), and `pending` is only accepted for a task that has not
    /// started. While the operation is paused a `running` report keeps the
    /// task paused; terminal reports are applied. A failure without a message
    /// gets a generic one.
    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let op = state
            .current_mut()
            .ok_or_else(|| ControlError::not_found("Task", task_id))?;

        let (ri, ti) = op.locate(task_id)?;
        op.ensure_not_cancelled()?;
        let is_paused = op.is_paused;

        let task = &mut op.regions[ri].tasks[ti];
        if task.status.is_terminal() {
            return Err(ControlError::InvalidState(format!(
                "Task {} is already {}",
                task_id, task.status
            )));
        }

        let next = match update.status {
            Some(TaskStatus::Paused) => {
                return Err(ControlError::Validation(
                    "Tasks cannot be paused individually; pause the operation".to_string(),
                ))
            }
            Some(TaskStatus::Pending) if task.status != TaskStatus::Pending => {
                return Err(ControlError::InvalidState(format!(
                    "Task {} has already started",
                    task_id
                )))
            }
            Some(TaskStatus::Running) if is_paused => TaskStatus::Paused,
            Some(status) => status,
            None => task.status,
        };

        task.progress = clamp_progress(update.progress);
        if let Some(step) = update.current_step {
            task.current_step = step;
        }
        if next != TaskStatus::Pending && task.start_time.is_none() {
            task.start_time = Some(now);
        }
        if next == TaskStatus::Failed {
            let message = update
                .error_message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
            log::warn!("Task {} failed: {}", task_id, message);
            task.error_message = Some(message);
        }
        if next.is_terminal() {
            task.end_time = Some(now);
        }
        task.status = next;
        let view = Operation::task_view(task, now);

        op.recompute(now);
        Ok(view)
    }

    /// Pauses the current operation. Running tasks become paused.
    pub fn pause(&self) -> Result<OperationSummary, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let op = state.require_current()?;
        op.ensure_not_cancelled()?;

        if !op.is_paused {
            op.is_paused = true;
            for task in op.tasks_mut() {
                if task.status == TaskStatus::Running {
                    task.status = TaskStatus::Paused;
                }
            }
            log::info!("Operation {} paused", op.id);
        }

        op.recompute(now);
        Ok(op.summary(now))
    }

    /// Resumes the current operation. Paused tasks go back to running.
    pub fn resume(&self) -> Result<OperationSummary, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let op = state.require_current()?;
        op.ensure_not_cancelled()?;

        if op.is_paused {
            op.is_paused = false;
            for task in op.tasks_mut() {
                if task.status == TaskStatus::Paused {
                    task.status = TaskStatus::Running;
                }
            }
            log::info!("Operation {} resumed", op.id);
        }

        op.recompute(now);
        Ok(op.summary(now))
    }

    /// Skips one task that has not finished yet.
    pub fn skip_task(&self, task_id: &str) -> Result<Task, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let op = state
            .current_mut()
            .ok_or_else(|| ControlError::not_found("Task", task_id))?;

        let (ri, ti) = op.locate(task_id)?;
        let task = &mut op.regions[ri].tasks[ti];
        if task.status.is_terminal() {
            return Err(ControlError::InvalidState(format!(
                "Task {} is already {}",
                task_id, task.status
            )));
        }

        task.status = TaskStatus::Skipped;
        task.end_time = Some(now);
        let view = Operation::task_view(task, now);
        log::info!("Task {} skipped", task_id);

        op.recompute(now);
        Ok(view)
    }

    /// Skips every unfinished task in a region and marks the region skipped.
    pub fn skip_region(&self, region_code: &str) -> Result<Region, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let op = state
            .current_mut()
            .ok_or_else(|| ControlError::not_found("Region", region_code))?;

        let ri = *op
            .region_index
            .get(region_code)
            .ok_or_else(|| ControlError::not_found("Region", region_code))?;
        op.ensure_not_cancelled()?;

        let region = &mut op.regions[ri];
        region.skipped = true;
        let mut skipped = 0;
        for task in region.tasks.iter_mut().filter(|t| !t.status.is_terminal()) {
            task.status = TaskStatus::Skipped;
            task.end_time = Some(now);
            skipped += 1;
        }
        log::info!("Region {} skipped ({} task(s))", region_code, skipped);

        op.recompute(now);
        Ok(op.region_view(ri, now))
    }

    /// Cancels the current operation. Every unfinished task becomes
    /// cancelled and the operation no longer blocks a new start.
    pub fn cancel(&self) -> Result<OperationSummary, ControlError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let op = state.require_current()?;
        op.ensure_not_cancelled()?;

        op.is_cancelled = true;
        op.is_paused = false;
        let mut cancelled = 0;
        for task in op.tasks_mut().filter(|t| !t.status.is_terminal()) {
            task.status = TaskStatus::Cancelled;
            task.end_time = Some(now);
            cancelled += 1;
        }
        log::info!("Operation {} cancelled ({} task(s))", op.id, cancelled);

        op.recompute(now);
        Ok(op.summary(now))
    }

    /// Jobs linked to the current operation while it is paused.
    pub fn paused_job_ids(&self) -> HashSet<String> {
        let state = self.lock();
        match state.current() {
            Some(op) if op.is_paused && !op.is_cancelled => op.job_ids.clone(),
            _ => HashSet::new(),
        }
    }
}
