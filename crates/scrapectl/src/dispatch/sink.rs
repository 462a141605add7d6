//! Hand-off of work units to the external execution layer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::dispatch::RunMode;
use crate::error::ControlError;

/// One job execution handed to the external worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub run_id: String,
    pub job_id: String,
    pub scraper: String,
    pub mode: RunMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
    pub queued_at: DateTime<Utc>,
}

/// Where dispatched work goes. Submission never waits for execution.
pub trait WorkSink: Send + Sync {
    fn submit(&self, unit: WorkUnit) -> Result<(), ControlError>;

    /// How many more units the sink takes right now. `None` means unbounded.
    fn remaining_capacity(&self) -> Option<usize> {
        None
    }
}

/// Bounded in-process queue that the external worker drains by polling
/// [`QueueSink::claim`].
pub struct QueueSink {
    sender: Sender<WorkUnit>,
    receiver: Receiver<WorkUnit>,
    closed: AtomicBool,
}

impl QueueSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded::<WorkUnit>(capacity.max(1));
        Self {
            sender,
            receiver,
            closed: AtomicBool::new(false),
        }
    }

    /// Removes and returns up to `max` queued units, oldest first.
    pub fn claim(&self, max: usize) -> Vec<WorkUnit> {
        self.receiver.try_iter().take(max).collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Stops accepting new units. Already queued units can still be claimed.
    pub fn close(&self) {
        log::info!("Closing work queue with {} pending units", self.len());
        self.closed.store(true, Ordering::Release);
    }
}

impl WorkSink for QueueSink {
    fn submit(&self, unit: WorkUnit) -> Result<(), ControlError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ControlError::Dispatch("Work queue is closed".to_string()));
        }

        match self.sender.try_send(unit) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(unit)) => Err(ControlError::Dispatch(format!(
                "Work queue is full, could not queue run {}",
                unit.run_id
            ))),
            Err(TrySendError::Disconnected(_)) => {
                Err(ControlError::Dispatch("Work queue is closed".to_string()))
            }
        }
    }

    fn remaining_capacity(&self) -> Option<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Some(0);
        }
        self.sender
            .capacity()
            .map(|cap| cap.saturating_sub(self.sender.len()))
    }
}

/// Accepts and drops every unit. Used for dry runs.
#[derive(Debug, Default)]
pub struct NoopSink {
    submitted: AtomicUsize,
}

impl NoopSink {
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl WorkSink for NoopSink {
    fn submit(&self, unit: WorkUnit) -> Result<(), ControlError> {
        log::debug!("Dry run: dropping work unit {} for {}", unit.run_id, unit.job_id);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(run_id: &str) -> WorkUnit {
        WorkUnit {
            run_id: run_id.to_string(),
            job_id: "federal:bills:daily".to_string(),
            scraper: "openparliament".to_string(),
            mode: RunMode::Daily,
            since: None,
            queued_at: Utc::now(),
        }
    }

    #[test]
    fn test_queue_claim_in_order() {
        let sink = QueueSink::new(8);
        sink.submit(unit("a")).unwrap();
        sink.submit(unit("b")).unwrap();
        sink.submit(unit("c")).unwrap();
        assert_eq!(sink.len(), 3);

        let claimed: Vec<String> = sink.claim(2).into_iter().map(|u| u.run_id).collect();
        assert_eq!(claimed, vec!["a", "b"]);
        assert_eq!(sink.claim(10).len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_queue_full_is_dispatch_error() {
        let sink = QueueSink::new(1);
        sink.submit(unit("a")).unwrap();
        let err = sink.submit(unit("b")).unwrap_err();
        assert!(matches!(err, ControlError::Dispatch(_)));
    }

    #[test]
    fn test_closed_queue_rejects_but_drains() {
        let sink = QueueSink::new(4);
        sink.submit(unit("a")).unwrap();
        sink.close();
        assert!(sink.submit(unit("b")).is_err());
        assert_eq!(sink.claim(4).len(), 1);
    }

    #[test]
    fn test_remaining_capacity() {
        let sink = QueueSink::new(3);
        assert_eq!(sink.remaining_capacity(), Some(3));
        sink.submit(unit("a")).unwrap();
        assert_eq!(sink.remaining_capacity(), Some(2));
        sink.close();
        assert_eq!(sink.remaining_capacity(), Some(0));
        assert_eq!(NoopSink::default().remaining_capacity(), None);
    }

    #[test]
    fn test_noop_sink_counts() {
        let sink = NoopSink::default();
        sink.submit(unit("a")).unwrap();
        sink.submit(unit("b")).unwrap();
        assert_eq!(sink.submitted(), 2);
    }
}
