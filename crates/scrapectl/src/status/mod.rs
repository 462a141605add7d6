//! Read-only status, log and failure queries for the admin dashboard, plus
//! the write path the external worker uses to report back.

mod classify;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use classify::{classify, FailureCategory};

use crate::clock::Clock;
use crate::db::Subject;
use crate::error::ControlError;
use crate::registry::{Job, JobRegistry};
use crate::runs::{LogLine, NewLogLine, RunRecord, RunStatus, RunStore};

pub const DEFAULT_LOG_LIMIT: u32 = 100;
pub const MAX_LOG_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Job,
    Scraper,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: String,
    pub kind: SubjectKind,
    /// `disabled`, `idle`, or the latest run's status.
    pub status: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    /// Succeeded / finished runs in the history window, 0 to 1.
    pub success_rate: Option<f64>,
    pub total_runs: u64,
    pub succeeded_runs: u64,
    pub failed_runs: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailures {
    pub job_id: String,
    pub count: usize,
    pub last_error: Option<String>,
    pub last_failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFailures {
    pub category: FailureCategory,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub window_days: u32,
    pub total_failures: usize,
    /// Most failures first.
    pub by_job: Vec<JobFailures>,
    pub by_category: Vec<CategoryFailures>,
}

pub struct StatusService {
    registry: Arc<JobRegistry>,
    runs: RunStore,
    window_days: u32,
    clock: Arc<dyn Clock>,
}

impl StatusService {
    pub fn new(
        registry: Arc<JobRegistry>,
        runs: RunStore,
        window_days: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            runs,
            window_days,
            clock,
        }
    }

    fn window_start(&self) -> DateTime<Utc> {
        self.clock.now() - Duration::days(i64::from(self.window_days))
    }

    /// Resolves an id to a job, or failing that to a scraper with at least
    /// one configured job.
    fn resolve<'a>(&self, id: &'a str) -> Result<(Subject<'a>, Vec<Job>), ControlError> {
        if let Some(job) = self.registry.get(id) {
            return Ok((Subject::Job(id), vec![job]));
        }
        let jobs = self.registry.jobs_for_scraper(id);
        if jobs.is_empty() {
            return Err(ControlError::not_found("Job or scraper", id));
        }
        Ok((Subject::Scraper(id), jobs))
    }

    pub fn get_status(&self, id: &str) -> Result<StatusRecord, ControlError> {
        let (subject, jobs) = self.resolve(id)?;
        let kind = match subject {
            Subject::Job(_) => SubjectKind::Job,
            Subject::Scraper(_) => SubjectKind::Scraper,
        };

        let enabled = jobs.iter().any(|j| j.enabled);
        let last_run = jobs.iter().filter_map(|j| j.last_run).max();

        let latest = self.runs.latest(subject)?;
        let counts = self.runs.outcome_counts(subject, self.window_start())?;
        let finished = counts.succeeded + counts.failed;

        let status = if !enabled {
            "disabled".to_string()
        } else {
            latest
                .map(|run| run.status.as_str().to_string())
                .unwrap_or_else(|| "idle".to_string())
        };

        Ok(StatusRecord {
            id: id.to_string(),
            kind,
            status,
            enabled,
            last_run,
            success_rate: (finished > 0).then(|| counts.succeeded as f64 / finished as f64),
            total_runs: counts.total,
            succeeded_runs: counts.succeeded,
            failed_runs: counts.failed,
            last_error: self.runs.last_error(subject)?,
        })
    }

    /// Most recent log lines first. `limit` defaults to 100 and is capped at
    /// 1000; zero returns nothing.
    pub fn get_logs(&self, id: &str, limit: Option<u32>) -> Result<Vec<LogLine>, ControlError> {
        let (subject, _) = self.resolve(id)?;
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
        Ok(self.runs.recent_logs(subject, limit)?)
    }

    /// Failed runs in the history window grouped by job and by category.
    pub fn get_failures(&self) -> Result<FailureReport, ControlError> {
        let failures = self.runs.failures_since(self.window_start())?;
        Ok(build_failure_report(self.window_days, &failures))
    }

    pub fn report_run(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<RunRecord, ControlError> {
        self.runs.report(run_id, status, error)
    }

    pub fn append_logs(&self, job_id: &str, lines: &[NewLogLine]) -> Result<usize, ControlError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| ControlError::not_found("Job", job_id))?;
        self.runs.append_logs(&job, lines)
    }

    pub fn run(&self, run_id: &str) -> Result<RunRecord, ControlError> {
        self.runs
            .get(run_id)?
            .ok_or_else(|| ControlError::not_found("Run", run_id))
    }
}

/// `failures` must be newest first.
fn build_failure_report(window_days: u32, failures: &[RunRecord]) -> FailureReport {
    let mut by_job: Vec<JobFailures> = Vec::new();
    let mut job_index: HashMap<&str, usize> = HashMap::new();
    let mut by_category: BTreeMap<FailureCategory, usize> = BTreeMap::new();

    for run in failures {
        let error = run.error.as_deref().unwrap_or_default();
        *by_category.entry(classify(error)).or_default() += 1;

        match job_index.get(run.job_id.as_str()) {
            Some(&i) => by_job[i].count += 1,
            None => {
                job_index.insert(run.job_id.as_str(), by_job.len());
                by_job.push(JobFailures {
                    job_id: run.job_id.clone(),
                    count: 1,
                    last_error: run.error.clone(),
                    last_failed_at: run.finished_at,
                });
            }
        }
    }

    // Stable sort keeps the most recent failure first among equal counts.
    by_job.sort_by(|a, b| b.count.cmp(&a.count));

    let mut by_category: Vec<CategoryFailures> = by_category
        .into_iter()
        .map(|(category, count)| CategoryFailures { category, count })
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count));

    FailureReport {
        window_days,
        total_failures: failures.len(),
        by_job,
        by_category,
    }
}
