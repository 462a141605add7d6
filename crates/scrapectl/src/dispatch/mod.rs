//! Run dispatcher: resolves run-now requests against the registry and hands
//! one work unit per matched job to the execution layer.

pub mod mode;
pub mod scheduler;
pub mod scope;
pub mod sink;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::ControlError;
use crate::progress::ProgressTracker;
use crate::registry::{Job, JobRegistry};
use crate::runs::{LogLevel, RunStore};

pub use mode::RunMode;
pub use scheduler::DailyScheduler;
pub use scope::Scope;
pub use sink::{NoopSink, QueueSink, WorkSink, WorkUnit};

/// A validated run-now command.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub scope: Scope,
    pub mode: RunMode,
    /// Only ever set for bootstrap runs.
    pub since: Option<NaiveDate>,
}

impl RunRequest {
    /// Validates the raw request. A `since` date on a non-bootstrap run is
    /// dropped rather than rejected.
    pub fn parse(scope: &str, mode: &str, since: Option<NaiveDate>) -> Result<Self, ControlError> {
        let mode: RunMode = mode.parse()?;
        let scope: Scope = scope.parse()?;
        Ok(Self::new(scope, mode, since))
    }

    pub fn new(scope: Scope, mode: RunMode, since: Option<NaiveDate>) -> Self {
        let since = match (mode, since) {
            (RunMode::Bootstrap, since) => since,
            (_, Some(date)) => {
                log::debug!("Ignoring since={} for {} run of '{}'", date, mode, scope);
                None
            }
            (_, None) => None,
        };
        Self { scope, mode, since }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAcceptance {
    pub accepted_job_ids: Vec<String>,
    pub run_ids: Vec<String>,
    pub mode: RunMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
}

pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    tracker: Arc<ProgressTracker>,
    runs: RunStore,
    sink: Arc<dyn WorkSink>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        tracker: Arc<ProgressTracker>,
        runs: RunStore,
        sink: Arc<dyn WorkSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            tracker,
            runs,
            sink,
            clock,
        }
    }

    /// Queues every job matching `scope`, enabled or not.
    pub fn run_now(
        &self,
        scope: &str,
        mode: &str,
        since: Option<NaiveDate>,
    ) -> Result<RunAcceptance, ControlError> {
        self.dispatch(RunRequest::parse(scope, mode, since)?)
    }

    /// Queues every matched job. Refuses the whole request when any of them
    /// belongs to the paused operation.
    pub fn dispatch(&self, request: RunRequest) -> Result<RunAcceptance, ControlError> {
        let span = tracing::info_span!("dispatch", scope = %request.scope, mode = %request.mode);
        let _guard = span.enter();

        let jobs: Vec<Job> = self
            .registry
            .list_jobs()
            .into_iter()
            .filter(|job| request.scope.matches(&job.id))
            .collect();

        if jobs.is_empty() {
            return Err(ControlError::NoMatch(request.scope.to_string()));
        }

        let paused = self.tracker.paused_job_ids();
        if let Some(job) = jobs.iter().find(|j| paused.contains(&j.id)) {
            return Err(ControlError::Conflict(format!(
                "Job {} belongs to a paused operation",
                job.id
            )));
        }

        self.enqueue(&jobs, request.mode, request.since)
    }

    /// Queues a daily run of every job that is enabled and configured as
    /// daily-eligible. Jobs of the paused operation are held back; the rest
    /// still run.
    pub fn run_all_daily(&self) -> Result<RunAcceptance, ControlError> {
        let span = tracing::info_span!("dispatch", scope = "daily", mode = "daily");
        let _guard = span.enter();

        let paused = self.tracker.paused_job_ids();
        let (jobs, held): (Vec<Job>, Vec<Job>) = self
            .registry
            .list_jobs()
            .into_iter()
            .filter(Job::is_daily_eligible)
            .partition(|job| !paused.contains(&job.id));

        for job in &held {
            log::info!("Holding back daily run of {}: its operation is paused", job.id);
        }

        if jobs.is_empty() {
            let reason = if held.is_empty() {
                "*:* (no enabled daily jobs)"
            } else {
                "*:* (every enabled daily job is paused)"
            };
            return Err(ControlError::NoMatch(reason.to_string()));
        }

        self.enqueue(&jobs, RunMode::Daily, None)
    }

    fn enqueue(
        &self,
        jobs: &[Job],
        mode: RunMode,
        since: Option<NaiveDate>,
    ) -> Result<RunAcceptance, ControlError> {
        if let Some(free) = self.sink.remaining_capacity() {
            if free < jobs.len() {
                return Err(ControlError::Dispatch(format!(
                    "Work queue has room for {} of {} run(s), nothing was queued",
                    free,
                    jobs.len()
                )));
            }
        }

        let mut acceptance = RunAcceptance {
            accepted_job_ids: Vec::with_capacity(jobs.len()),
            run_ids: Vec::with_capacity(jobs.len()),
            mode,
            since,
        };

        for job in jobs {
            let unit = WorkUnit {
                run_id: Uuid::new_v4().to_string(),
                job_id: job.id.clone(),
                scraper: job.scraper.clone(),
                mode,
                since,
                queued_at: self.clock.now(),
            };

            self.runs.create(&unit)?;

            let run_id = unit.run_id.clone();
            if let Err(e) = self.sink.submit(unit) {
                log::error!("Failed to queue run {} for {}: {}", run_id, job.id, e);
                if let Err(mark_err) = self.runs.mark_failed(&run_id, &e.to_string()) {
                    log::error!("Failed to mark run {} failed: {}", run_id, mark_err);
                }
                return Err(partial_failure(e, &acceptance));
            }
            self.registry.record_run_start(&job.id);

            let message = match since {
                Some(date) => format!("Queued {} run {} (since {})", mode, run_id, date),
                None => format!("Queued {} run {}", mode, run_id),
            };
            self.runs
                .log_event(job, Some(&run_id), LogLevel::Info, &message);

            tracing::debug!(job_id = %job.id, run_id = %run_id, "queued work unit");
            acceptance.accepted_job_ids.push(job.id.clone());
            acceptance.run_ids.push(run_id);
        }

        log::info!(
            "Accepted {} run for {} job(s)",
            mode,
            acceptance.accepted_job_ids.len()
        );

        Ok(acceptance)
    }
}

/// Names the jobs that were already queued when a batch stopped halfway, so
/// a retry can target only the rest.
fn partial_failure(err: ControlError, accepted: &RunAcceptance) -> ControlError {
    match err {
        ControlError::Dispatch(msg) if !accepted.accepted_job_ids.is_empty() => {
            ControlError::Dispatch(format!(
                "{}; already queued: {}",
                msg,
                accepted.accepted_job_ids.join(", ")
            ))
        }
        other => other,
    }
}
