//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::path::PathBuf;

use scrapectl::config::schema::{
    Config, DatabaseConfig, HistoryConfig, JobConfig, LoggingConfig, QueueConfig,
    SchedulerConfig, ServerConfig,
};
use scrapectl::progress::{RegionSpec, TaskSpec};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    jobs: Vec<JobConfig>,
    database_path: Option<PathBuf>,
    window_days: u32,
    queue_capacity: usize,
    scheduler_enabled: bool,
}

impl ConfigBuilder {
    /// In-memory database, scheduler off, no jobs.
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            database_path: Some(PathBuf::from(":memory:")),
            window_days: 30,
            queue_capacity: 64,
            scheduler_enabled: false,
        }
    }

    /// The job set used by most API tests.
    pub fn civic() -> Self {
        Self::new()
            .job("federal:bills:daily", "openparliament")
            .job("federal:votes:daily", "openparliament")
            .job("ca_on:bills:daily", "scrapers-ca")
            .non_daily_job("ca_on:members:bootstrap", "scrapers-ca")
            .disabled_job("ca_qc:bills:daily", "scrapers-ca")
    }

    pub fn job(mut self, id: &str, scraper: &str) -> Self {
        self.jobs.push(JobConfig::new(id, scraper));
        self
    }

    pub fn disabled_job(mut self, id: &str, scraper: &str) -> Self {
        let mut job = JobConfig::new(id, scraper);
        job.enabled = false;
        self.jobs.push(job);
        self
    }

    pub fn non_daily_job(mut self, id: &str, scraper: &str) -> Self {
        let mut job = JobConfig::new(id, scraper);
        job.daily = false;
        self.jobs.push(job);
        self
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.database_path = Some(path);
        self
    }

    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        Config {
            server: ServerConfig {
                listen_addr: "127.0.0.1:0".to_string(),
                cors_enabled: true,
            },
            database: DatabaseConfig {
                path: self.database_path,
            },
            logging: LoggingConfig::default(),
            history: HistoryConfig {
                window_days: self.window_days,
            },
            scheduler: SchedulerConfig {
                enabled: self.scheduler_enabled,
                ..SchedulerConfig::default()
            },
            queue: QueueConfig {
                capacity: self.queue_capacity,
            },
            jobs: self.jobs,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A region whose tasks are given by name.
pub fn region(code: &str, name: &str, tasks: &[&str]) -> RegionSpec {
    RegionSpec {
        region_code: code.to_string(),
        region_name: name.to_string(),
        tasks: tasks.iter().map(|t| TaskSpec::Name(t.to_string())).collect(),
    }
}
