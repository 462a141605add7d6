//! Run history and scraper log lines.
//!
//! Every dispatched work unit gets a run record. The external worker reports
//! the outcome back through [`RunStore::report`] and ships log lines through
//! [`RunStore::append_logs`]; the status surface reads both.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::db::log_repo::{self, LogRow};
use crate::db::run_repo::{self, OutcomeCounts, RunRow};
use crate::db::{format_timestamp, parse_timestamp, Database, DatabaseError, Subject};
use crate::dispatch::{RunMode, WorkUnit};
use crate::error::ControlError;
use crate::registry::Job;

const DEFAULT_FAILURE_MESSAGE: &str = "Run failed without an error message";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(ControlError::Validation(format!(
                "Unknown run status '{}'",
                other
            ))),
        }
    }
}

/// One dispatched execution of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub job_id: String,
    pub scraper: String,
    pub mode: RunMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    fn from_row(row: &RunRow) -> Result<Self, DatabaseError> {
        let corrupt = |reason: String| DatabaseError::CorruptRow {
            table: "runs",
            reason,
        };
        let mode = row
            .mode
            .parse::<RunMode>()
            .map_err(|e| corrupt(e.to_string()))?;
        let status = row
            .status
            .parse::<RunStatus>()
            .map_err(|e| corrupt(e.to_string()))?;
        let since = match row.since.as_deref() {
            Some(s) => Some(
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| corrupt(format!("bad since date '{}': {}", s, e)))?,
            ),
            None => None,
        };
        let opt_ts = |s: &Option<String>| -> Result<Option<DateTime<Utc>>, DatabaseError> {
            s.as_deref().map(|s| parse_timestamp("runs", s)).transpose()
        };

        Ok(Self {
            run_id: row.id.clone(),
            job_id: row.job_id.clone(),
            scraper: row.scraper.clone(),
            mode,
            since,
            status,
            error: row.error.clone(),
            queued_at: parse_timestamp("runs", &row.queued_at)?,
            started_at: opt_ts(&row.started_at)?,
            finished_at: opt_ts(&row.finished_at)?,
        })
    }

    fn to_row(&self) -> RunRow {
        RunRow {
            id: self.run_id.clone(),
            job_id: self.job_id.clone(),
            scraper: self.scraper.clone(),
            mode: self.mode.as_str().to_string(),
            since: self.since.map(|d| d.format("%Y-%m-%d").to_string()),
            status: self.status.as_str().to_string(),
            error: self.error.clone(),
            queued_at: format_timestamp(self.queued_at),
            started_at: self.started_at.map(format_timestamp),
            finished_at: self.finished_at.map(format_timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ControlError::Validation(format!(
                "Unknown log level '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

impl LogLine {
    fn from_row(row: &LogRow) -> Result<Self, DatabaseError> {
        let level = row
            .level
            .parse::<LogLevel>()
            .map_err(|e| DatabaseError::CorruptRow {
                table: "run_logs",
                reason: e.to_string(),
            })?;
        Ok(Self {
            job_id: row.job_id.clone(),
            run_id: row.run_id.clone(),
            level,
            message: row.message.clone(),
            logged_at: parse_timestamp("run_logs", &row.logged_at)?,
        })
    }
}

/// A log line as reported by a scraper, before it is stamped and stored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLogLine {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Database-backed run history.
#[derive(Clone)]
pub struct RunStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl RunStore {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts a `queued` run for a work unit that is about to be submitted.
    pub fn create(&self, unit: &WorkUnit) -> Result<RunRecord, DatabaseError> {
        let record = RunRecord {
            run_id: unit.run_id.clone(),
            job_id: unit.job_id.clone(),
            scraper: unit.scraper.clone(),
            mode: unit.mode,
            since: unit.since,
            status: RunStatus::Queued,
            error: None,
            queued_at: unit.queued_at,
            started_at: None,
            finished_at: None,
        };
        run_repo::insert(&self.db, &record.to_row())?;
        Ok(record)
    }

    pub fn get(&self, run_id: &str) -> Result<Option<RunRecord>, DatabaseError> {
        run_repo::find_by_id(&self.db, run_id)?
            .as_ref()
            .map(RunRecord::from_row)
            .transpose()
    }

    /// Applies a status report from the external worker.
    ///
    /// `queued` cannot be reported. Finished runs cannot change again. A
    /// failure without a message gets a generic one so it is never silent.
    pub fn report(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<RunRecord, ControlError> {
        if status == RunStatus::Queued {
            return Err(ControlError::Validation(
                "A run cannot be reported as queued".to_string(),
            ));
        }

        let mut record = self
            .get(run_id)?
            .ok_or_else(|| ControlError::not_found("Run", run_id))?;

        if record.status.is_finished() {
            return Err(ControlError::InvalidState(format!(
                "Run {} already {}",
                run_id, record.status
            )));
        }

        let now = self.clock.now();
        if record.started_at.is_none() {
            record.started_at = Some(now);
        }
        record.status = status;
        if status.is_finished() {
            record.finished_at = Some(now);
        }
        if status == RunStatus::Failed {
            record.error = Some(
                error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            );
        }

        run_repo::update(&self.db, &record.to_row())?;
        log::info!("Run {} ({}) is now {}", run_id, record.job_id, status);
        Ok(record)
    }

    /// Marks a run failed without going through the worker report path.
    pub fn mark_failed(&self, run_id: &str, error: &str) -> Result<(), ControlError> {
        self.report(run_id, RunStatus::Failed, Some(error.to_string()))
            .map(|_| ())
    }

    /// Validates and stores log lines for a job. Nothing is stored if any
    /// line has an unknown level.
    pub fn append_logs(&self, job: &Job, lines: &[NewLogLine]) -> Result<usize, ControlError> {
        let now = format_timestamp(self.clock.now());
        let rows = lines
            .iter()
            .map(|line| {
                let level = line.level.parse::<LogLevel>()?;
                Ok(LogRow {
                    id: 0,
                    job_id: job.id.clone(),
                    scraper: job.scraper.clone(),
                    run_id: line.run_id.clone(),
                    level: level.as_str().to_string(),
                    message: line.message.clone(),
                    logged_at: now.clone(),
                })
            })
            .collect::<Result<Vec<_>, ControlError>>()?;

        Ok(log_repo::insert_many(&self.db, &rows)?)
    }

    /// Records a control-plane event in a job's log.
    pub fn log_event(&self, job: &Job, run_id: Option<&str>, level: LogLevel, message: &str) {
        let row = LogRow {
            id: 0,
            job_id: job.id.clone(),
            scraper: job.scraper.clone(),
            run_id: run_id.map(str::to_string),
            level: level.as_str().to_string(),
            message: message.to_string(),
            logged_at: format_timestamp(self.clock.now()),
        };
        if let Err(e) = log_repo::insert_many(&self.db, &[row]) {
            log::error!("Failed to record log line for {}: {}", job.id, e);
        }
    }

    pub fn recent_logs(&self, subject: Subject<'_>, limit: u32) -> Result<Vec<LogLine>, DatabaseError> {
        log_repo::recent(&self.db, subject, limit)?
            .iter()
            .map(LogLine::from_row)
            .collect()
    }

    pub fn latest(&self, subject: Subject<'_>) -> Result<Option<RunRecord>, DatabaseError> {
        run_repo::latest(&self.db, subject)?
            .as_ref()
            .map(RunRecord::from_row)
            .transpose()
    }

    pub fn outcome_counts(
        &self,
        subject: Subject<'_>,
        since: DateTime<Utc>,
    ) -> Result<OutcomeCounts, DatabaseError> {
        run_repo::outcome_counts(&self.db, subject, &format_timestamp(since))
    }

    pub fn last_error(&self, subject: Subject<'_>) -> Result<Option<String>, DatabaseError> {
        run_repo::last_error(&self.db, subject)
    }

    pub fn failures_since(&self, since: DateTime<Utc>) -> Result<Vec<RunRecord>, DatabaseError> {
        run_repo::failures_since(&self.db, &format_timestamp(since))?
            .iter()
            .map(RunRecord::from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::JobConfig;
    use chrono::{Duration, TimeZone};

    fn setup() -> (RunStore, Arc<ManualClock>, Job) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap(),
        ));
        let store = RunStore::new(Database::open_in_memory().unwrap(), clock.clone());
        let job = Job::from_config(&JobConfig::new("federal:bills:daily", "openparliament"));
        (store, clock, job)
    }

    fn unit(clock: &ManualClock, run_id: &str) -> WorkUnit {
        WorkUnit {
            run_id: run_id.to_string(),
            job_id: "federal:bills:daily".to_string(),
            scraper: "openparliament".to_string(),
            mode: RunMode::Bootstrap,
            since: NaiveDate::from_ymd_opt(2020, 1, 1),
            queued_at: clock.now(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let (store, clock, _) = setup();
        let created = store.create(&unit(&clock, "r1")).unwrap();
        assert_eq!(created.status, RunStatus::Queued);
        assert_eq!(store.get("r1").unwrap(), Some(created));
        assert!(store.get("r2").unwrap().is_none());
    }

    #[test]
    fn test_report_lifecycle() {
        let (store, clock, _) = setup();
        store.create(&unit(&clock, "r1")).unwrap();

        clock.advance(Duration::seconds(10));
        let running = store.report("r1", RunStatus::Running, None).unwrap();
        assert_eq!(running.started_at, Some(clock.now()));
        assert!(running.finished_at.is_none());

        clock.advance(Duration::seconds(50));
        let done = store.report("r1", RunStatus::Succeeded, None).unwrap();
        assert_eq!(done.finished_at, Some(clock.now()));
        assert!(done.error.is_none());

        let err = store.report("r1", RunStatus::Failed, None).unwrap_err();
        assert!(matches!(err, ControlError::InvalidState(_)));
    }

    #[test]
    fn test_failed_report_gets_default_message() {
        let (store, clock, _) = setup();
        store.create(&unit(&clock, "r1")).unwrap();
        let failed = store
            .report("r1", RunStatus::Failed, Some("  ".to_string()))
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some(DEFAULT_FAILURE_MESSAGE));
    }

    #[test]
    fn test_report_unknown_and_queued() {
        let (store, clock, _) = setup();
        assert!(matches!(
            store.report("nope", RunStatus::Running, None),
            Err(ControlError::NotFound { kind: "Run", .. })
        ));
        store.create(&unit(&clock, "r1")).unwrap();
        assert!(matches!(
            store.report("r1", RunStatus::Queued, None),
            Err(ControlError::Validation(_))
        ));
    }

    #[test]
    fn test_append_logs_validates_levels() {
        let (store, _, job) = setup();
        let lines = vec![
            NewLogLine {
                level: "INFO".to_string(),
                message: "fetched 12 bills".to_string(),
                run_id: None,
            },
            NewLogLine {
                level: "loud".to_string(),
                message: "??".to_string(),
                run_id: None,
            },
        ];
        assert!(matches!(
            store.append_logs(&job, &lines),
            Err(ControlError::Validation(_))
        ));
        assert!(store
            .recent_logs(Subject::Job(&job.id), 10)
            .unwrap()
            .is_empty());

        assert_eq!(store.append_logs(&job, &lines[..1]).unwrap(), 1);
        let logs = store.recent_logs(Subject::Job(&job.id), 10).unwrap();
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].message, "fetched 12 bills");
    }

    #[test]
    fn test_run_status_parse() {
        assert_eq!("Succeeded".parse::<RunStatus>().unwrap(), RunStatus::Succeeded);
        assert!("done".parse::<RunStatus>().is_err());
    }
}
