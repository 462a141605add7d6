pub mod api;
pub mod clock;
pub mod config;
pub mod control;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod progress;
pub mod registry;
pub mod runs;
pub mod status;

pub use api::{create_router, AppState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, load_config_from_str, Config, JobConfig};
pub use control::ControlPlane;
pub use db::{Database, DatabaseError};
pub use dispatch::{Dispatcher, RunAcceptance, RunMode, RunRequest, Scope};
pub use error::{ConfigError, ControlError, Result, ScrapectlError};
pub use progress::{ProgressTracker, TaskStatus, TaskUpdate};
pub use registry::{Job, JobRegistry};
pub use runs::{RunRecord, RunStatus, RunStore};
pub use status::{FailureReport, StatusRecord, StatusService};
