use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Execution semantics of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Incremental run picking up what changed since the last one.
    Daily,
    /// One-time historical backfill, optionally bounded by a `since` date.
    Bootstrap,
    /// Ad-hoc run with scraper-specific semantics.
    Special,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Daily => "daily",
            RunMode::Bootstrap => "bootstrap",
            RunMode::Special => "special",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RunMode::Daily),
            "bootstrap" => Ok(RunMode::Bootstrap),
            "special" => Ok(RunMode::Special),
            _ => Err(ControlError::Validation(format!(
                "Invalid mode '{}': expected daily, bootstrap or special",
                s
            ))),
        }
    }
}
