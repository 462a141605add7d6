//! Hierarchical progress tracking: operation → regions → tasks.

mod aggregate;
mod model;
mod tracker;

pub use model::{
    OperationId, OperationSummary, ProgressSnapshot, Region, RegionCounts, RegionSpec, Task,
    TaskCounts, TaskSpec, TaskStatus, TaskUpdate,
};
pub use tracker::ProgressTracker;
