use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::config::schema::Config;
use crate::error::ConfigError;

static RE_JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+(:[A-Za-z0-9_.\-]+)*$").unwrap());

/// Returns the canonical config path: `~/.scrapectl/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".scrapectl").join("config.yaml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Checks whether a string is a well-formed job id.
pub fn is_valid_job_id(id: &str) -> bool {
    RE_JOB_ID.is_match(id)
}

/// Parses a `HH:MM` time of day.
pub fn parse_daily_at(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| ConfigError::Validation {
        message: format!("scheduler.daily_at '{}' is not HH:MM: {}", value, e),
    })
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.jobs.is_empty() {
        return Err(ConfigError::Validation {
            message: "At least one job must be configured".to_string(),
        });
    }

    let mut ids = HashSet::new();
    for job in &config.jobs {
        if !is_valid_job_id(&job.id) {
            return Err(ConfigError::InvalidJob {
                id: job.id.clone(),
                reason: "Job id must be colon-separated segments of [A-Za-z0-9_.-]".to_string(),
            });
        }
        if !ids.insert(job.id.as_str()) {
            return Err(ConfigError::InvalidJob {
                id: job.id.clone(),
                reason: "Duplicate job id".to_string(),
            });
        }
        if job.scraper.trim().is_empty() {
            return Err(ConfigError::InvalidJob {
                id: job.id.clone(),
                reason: "Scraper name must not be empty".to_string(),
            });
        }
    }

    if config.history.window_days == 0 {
        return Err(ConfigError::Validation {
            message: "history.window_days must be at least 1".to_string(),
        });
    }

    if config.queue.capacity == 0 {
        return Err(ConfigError::Validation {
            message: "queue.capacity must be at least 1".to_string(),
        });
    }

    parse_daily_at(&config.scheduler.daily_at)?;

    config
        .server
        .listen_addr
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Validation {
            message: format!(
                "server.listen_addr '{}' is invalid: {}",
                config.server.listen_addr, e
            ),
        })?;

    Ok(())
}
