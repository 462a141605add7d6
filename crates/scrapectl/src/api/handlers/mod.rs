//! HTTP API request handlers.

mod jobs;
mod progress;
mod scrapers;
mod system;

use std::sync::Arc;

use crate::dispatch::{Dispatcher, QueueSink};
use crate::progress::ProgressTracker;
use crate::registry::JobRegistry;
use crate::status::StatusService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub tracker: Arc<ProgressTracker>,
    pub dispatcher: Arc<Dispatcher>,
    pub status: Arc<StatusService>,
    pub queue: Arc<QueueSink>,
}

pub use jobs::{claim_work, list_jobs, report_run, run_all_daily, run_now, toggle_job};
pub use progress::{
    cancel_operation, pause_operation, progress_status, resume_operation, skip_region, skip_task,
    start_operation, update_task,
};
pub use scrapers::{append_logs, failures, scraper_logs, scraper_status};
pub use system::health;
