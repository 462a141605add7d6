//! Wires the registry, run store, tracker, dispatcher and status surface
//! together from a loaded [`Config`].

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::broadcast;

use crate::api::AppState;
use crate::clock::{Clock, SystemClock};
use crate::config::loader::parse_daily_at;
use crate::config::Config;
use crate::db::{default_database_path, Database};
use crate::dispatch::{DailyScheduler, Dispatcher, QueueSink};
use crate::error::{ConfigError, Result};
use crate::progress::ProgressTracker;
use crate::registry::JobRegistry;
use crate::runs::RunStore;
use crate::status::StatusService;

pub struct ControlPlane {
    pub registry: Arc<JobRegistry>,
    pub tracker: Arc<ProgressTracker>,
    pub dispatcher: Arc<Dispatcher>,
    pub status: Arc<StatusService>,
    pub queue: Arc<QueueSink>,
    scheduler: Option<DailyScheduler>,
    trigger_tx: broadcast::Sender<()>,
}

impl ControlPlane {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = open_database(config)?;

        let registry = Arc::new(JobRegistry::new(&config.jobs, clock.clone()));
        registry.set_database(db.clone())?;

        let runs = RunStore::new(db, clock.clone());
        let tracker = Arc::new(ProgressTracker::new(clock.clone()));
        let queue = Arc::new(QueueSink::new(config.queue.capacity));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            tracker.clone(),
            runs.clone(),
            queue.clone(),
            clock.clone(),
        ));
        let status = Arc::new(StatusService::new(
            registry.clone(),
            runs,
            config.history.window_days,
            clock.clone(),
        ));

        let scheduler = if config.scheduler.enabled {
            let daily_at = parse_daily_at(&config.scheduler.daily_at)?;
            Some(DailyScheduler::new(dispatcher.clone(), daily_at, clock))
        } else {
            None
        };

        let (trigger_tx, _) = broadcast::channel(4);

        log::info!(
            "Control plane ready with {} job(s)",
            registry.list_jobs().len()
        );

        Ok(Self {
            registry,
            tracker,
            dispatcher,
            status,
            queue,
            scheduler,
            trigger_tx,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            registry: self.registry.clone(),
            tracker: self.tracker.clone(),
            dispatcher: self.dispatcher.clone(),
            status: self.status.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Starts the daily scheduler thread. `None` when the scheduler is
    /// disabled in configuration.
    pub fn start_scheduler(&self) -> Option<JoinHandle<()>> {
        self.scheduler
            .as_ref()
            .map(|scheduler| scheduler.start(self.trigger_tx.subscribe()))
    }

    /// Wakes the scheduler for an immediate daily run.
    pub fn trigger_daily(&self) -> bool {
        self.trigger_tx.send(()).is_ok()
    }

    /// Stops the scheduler and refuses further work submissions.
    pub fn shutdown(self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
        self.queue.close();
        // Dropping the sender closes the trigger channel and wakes the loop.
        drop(self.trigger_tx);
    }
}

fn open_database(config: &Config) -> Result<Database> {
    if config.database.is_in_memory() {
        return Ok(Database::open_in_memory()?);
    }
    let path = match &config.database.path {
        Some(path) => path.clone(),
        None => default_database_path().ok_or_else(|| ConfigError::Validation {
            message: "Could not determine a home directory for the database".to_string(),
        })?,
    };
    log::info!("Opening database at {}", path.display());
    Ok(Database::open(&path)?)
}
