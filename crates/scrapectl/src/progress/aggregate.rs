//! Derived values: region status and progress, counts, timing.

use chrono::{DateTime, Duration, Utc};

use super::model::{Task, TaskStatus};

/// Mean progress over the tasks. 0 for an empty slice.
pub fn mean_progress<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> f64 {
    let (sum, count) = tasks
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), t| (sum + t.progress, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Region status from its tasks, checked in order:
/// all done -> completed; any failed (unless skipped by the operator) ->
/// failed; skipped by the operator -> skipped; any running -> running; any
/// paused -> paused; all terminal -> cancelled; all pending -> pending;
/// otherwise some work is left after some finished -> running.
pub fn region_status(tasks: &[Task], explicitly_skipped: bool) -> TaskStatus {
    if tasks.iter().all(|t| t.status.is_done()) {
        return TaskStatus::Completed;
    }
    if !explicitly_skipped && tasks.iter().any(|t| t.status == TaskStatus::Failed) {
        return TaskStatus::Failed;
    }
    if explicitly_skipped {
        return TaskStatus::Skipped;
    }
    if tasks.iter().any(|t| t.status == TaskStatus::Running) {
        return TaskStatus::Running;
    }
    if tasks.iter().any(|t| t.status == TaskStatus::Paused) {
        return TaskStatus::Paused;
    }
    if tasks.iter().all(|t| t.status.is_terminal()) {
        return TaskStatus::Cancelled;
    }
    if tasks.iter().all(|t| t.status == TaskStatus::Pending) {
        return TaskStatus::Pending;
    }
    TaskStatus::Running
}

/// Linear extrapolation of the finish time.
///
/// `eta = now + elapsed / fraction * (1 - fraction)`; `None` while nothing
/// has progressed.
pub fn linear_eta(now: DateTime<Utc>, start: DateTime<Utc>, fraction: f64) -> Option<DateTime<Utc>> {
    if fraction.is_nan() || fraction <= 0.0 {
        return None;
    }
    let fraction = fraction.min(1.0);
    let elapsed_ms = (now - start).num_milliseconds().max(0) as f64;
    let remaining_ms = elapsed_ms / fraction * (1.0 - fraction);
    Some(now + Duration::milliseconds(remaining_ms.round() as i64))
}

pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

/// Clamps a reported progress value into [0, 100]. NaN becomes 0.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(status: TaskStatus, progress: f64) -> Task {
        let mut t = Task::new("t".to_string(), "t".to_string(), "R".to_string());
        t.status = status;
        t.progress = progress;
        t
    }

    #[test]
    fn test_mean_progress() {
        let tasks = vec![
            task(TaskStatus::Completed, 100.0),
            task(TaskStatus::Running, 50.0),
        ];
        assert_eq!(mean_progress(&tasks), 75.0);
        assert_eq!(mean_progress(&Vec::<Task>::new()), 0.0);
    }

    #[test]
    fn test_region_status_rules() {
        use TaskStatus::*;
        let cases: Vec<(Vec<TaskStatus>, bool, TaskStatus)> = vec![
            (vec![Pending, Pending], false, Pending),
            (vec![Completed, Skipped], false, Completed),
            (vec![Completed, Skipped], true, Completed),
            (vec![Completed, Failed], false, Failed),
            (vec![Failed, Skipped], true, Skipped),
            (vec![Running, Pending], false, Running),
            (vec![Paused, Pending], false, Paused),
            (vec![Completed, Pending], false, Running),
            (vec![Cancelled, Completed], false, Cancelled),
            (vec![Cancelled, Skipped], true, Skipped),
            (vec![Running, Failed], false, Failed),
        ];
        for (statuses, skipped, expected) in cases {
            let tasks: Vec<Task> = statuses.iter().map(|s| task(*s, 0.0)).collect();
            assert_eq!(
                region_status(&tasks, skipped),
                expected,
                "{:?} skipped={}",
                statuses,
                skipped
            );
        }
    }

    #[test]
    fn test_linear_eta() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap();
        let now = start + Duration::minutes(10);

        assert_eq!(linear_eta(now, start, 0.0), None);
        assert_eq!(linear_eta(now, start, 0.5), Some(now + Duration::minutes(10)));
        assert_eq!(linear_eta(now, start, 0.25), Some(now + Duration::minutes(30)));
        assert_eq!(linear_eta(now, start, 1.0), Some(now));
        assert_eq!(linear_eta(now, start, f64::NAN), None);
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(150.0), 100.0);
        assert_eq!(clamp_progress(-10.0), 0.0);
        assert_eq!(clamp_progress(42.5), 42.5);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
    }

    #[test]
    fn test_seconds_between() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap();
        assert_eq!(seconds_between(start, start + Duration::milliseconds(1500)), 1.5);
        assert_eq!(seconds_between(start + Duration::seconds(1), start), 0.0);
    }
}
