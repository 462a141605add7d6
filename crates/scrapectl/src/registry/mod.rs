//! Job registry: the statically configured set of scrape jobs.
//!
//! Jobs come from configuration in a fixed order and are never created or
//! deleted at runtime. Only the `enabled` flag and `last_run` change; both
//! are written through to the `job_state` table when a database is attached.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::JobConfig;
use crate::db::job_state_repo::{self, JobStateRow};
use crate::db::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::error::ControlError;

/// One schedulable unit of scraping work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// `jurisdiction:entity:mode`.
    pub id: String,
    /// External scraper project that runs the job.
    pub scraper: String,
    /// Entity category used for grouping (`bills`, `votes`, ...).
    pub category: String,
    pub enabled: bool,
    /// Eligible for the daily batch.
    pub daily: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

impl Job {
    pub fn from_config(config: &JobConfig) -> Self {
        let category = config
            .category
            .clone()
            .or_else(|| config.id.split(':').nth(1).map(str::to_string))
            .unwrap_or_else(|| "general".to_string());

        Self {
            id: config.id.clone(),
            scraper: config.scraper.clone(),
            category,
            enabled: config.enabled,
            daily: config.daily,
            schedule: config.schedule.clone(),
            description: config.description.clone(),
            last_run: None,
        }
    }

    /// Whether `run_all_daily` should pick this job up.
    pub fn is_daily_eligible(&self) -> bool {
        self.enabled && self.daily
    }
}

pub struct JobRegistry {
    /// Jobs in registration order.
    jobs: RwLock<Vec<Job>>,
    /// Job id -> position in `jobs`. Fixed after construction.
    index: HashMap<String, usize>,
    db: RwLock<Option<Database>>,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(configs: &[JobConfig], clock: Arc<dyn Clock>) -> Self {
        let mut jobs = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());
        for config in configs {
            if index.contains_key(&config.id) {
                log::warn!("Ignoring duplicate job definition '{}'", config.id);
                continue;
            }
            index.insert(config.id.clone(), jobs.len());
            jobs.push(Job::from_config(config));
        }

        log::info!("Job registry initialized with {} jobs", jobs.len());

        Self {
            jobs: RwLock::new(jobs),
            index,
            db: RwLock::new(None),
            clock,
        }
    }

    /// Attaches a database and overlays persisted state onto the configured jobs.
    ///
    /// Stored rows for jobs that are no longer configured are ignored.
    pub fn set_database(&self, db: Database) -> Result<(), DatabaseError> {
        let rows = job_state_repo::load_all(&db)?;
        {
            let mut jobs = self.write_jobs();
            for row in rows {
                let Some(&pos) = self.index.get(&row.job_id) else {
                    log::debug!("Skipping stored state for unknown job '{}'", row.job_id);
                    continue;
                };
                let job = &mut jobs[pos];
                job.enabled = row.enabled;
                job.last_run = match row.last_run.as_deref() {
                    Some(ts) => Some(parse_timestamp("job_state", ts)?),
                    None => None,
                };
            }
        }

        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job registry DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
        Ok(())
    }

    fn get_database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job registry DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, Vec<Job>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, Vec<Job>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// All jobs in registration order.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.read_jobs().clone()
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        let pos = *self.index.get(job_id)?;
        Some(self.read_jobs()[pos].clone())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.index.contains_key(job_id)
    }

    /// Jobs run by the given scraper, in registration order.
    pub fn jobs_for_scraper(&self, scraper: &str) -> Vec<Job> {
        self.read_jobs()
            .iter()
            .filter(|j| j.scraper == scraper)
            .cloned()
            .collect()
    }

    /// Sets the enabled flag. Setting the value it already has changes nothing.
    pub fn toggle_job(&self, job_id: &str, enabled: bool) -> Result<Job, ControlError> {
        let pos = *self
            .index
            .get(job_id)
            .ok_or_else(|| ControlError::not_found("Job", job_id))?;

        let (job, changed) = {
            let mut jobs = self.write_jobs();
            let job = &mut jobs[pos];
            let changed = job.enabled != enabled;
            job.enabled = enabled;
            (job.clone(), changed)
        };

        if changed {
            log::info!(
                "Job {} {}",
                job_id,
                if enabled { "enabled" } else { "disabled" }
            );
            self.persist(&job);
        }

        Ok(job)
    }

    /// Stamps `last_run` with the current time. Unknown ids are ignored.
    pub fn record_run_start(&self, job_id: &str) {
        let Some(&pos) = self.index.get(job_id) else {
            log::debug!("record_run_start for unknown job '{}' ignored", job_id);
            return;
        };

        let job = {
            let mut jobs = self.write_jobs();
            let job = &mut jobs[pos];
            job.last_run = Some(self.clock.now());
            job.clone()
        };

        self.persist(&job);
    }

    fn persist(&self, job: &Job) {
        let Some(db) = self.get_database() else {
            return;
        };
        let row = JobStateRow {
            job_id: job.id.clone(),
            enabled: job.enabled,
            last_run: job.last_run.map(format_timestamp),
            updated_at: format_timestamp(self.clock.now()),
        };
        if let Err(e) = job_state_repo::upsert(&db, &row) {
            log::error!("Failed to persist state of job {}: {}", job.id, e);
        }
    }
}
