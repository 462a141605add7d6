use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapectlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid job '{id}': {reason}")]
    InvalidJob { id: String, reason: String },
}

/// Errors surfaced by the registry, dispatcher, tracker and status surface.
///
/// Every variant is recoverable by the caller; none of them is fatal to the
/// service process.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No jobs match scope '{0}'")]
    NoMatch(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

impl ControlError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ControlError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapectlError>;
