//! Once-a-day trigger for `run_all_daily`.
//!
//! Same shape as a periodic sync loop: a background thread with its own
//! current-thread runtime, woken either by the next daily deadline or by a
//! manual trigger on a broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::dispatch::Dispatcher;

/// Time from `now` until the next occurrence of `daily_at` (UTC).
/// A deadline that is exactly now is pushed to tomorrow.
pub fn next_run_delay(now: DateTime<Utc>, daily_at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(daily_at).and_utc();
    let next = if today > now {
        today
    } else {
        now.date_naive()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(daily_at).and_utc())
            .unwrap_or(today)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

pub struct DailyScheduler {
    dispatcher: Arc<Dispatcher>,
    daily_at: NaiveTime,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
}

impl DailyScheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, daily_at: NaiveTime, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher,
            daily_at,
            clock,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the scheduling loop in a background thread.
    /// Accepts a trigger receiver for manual "run all daily" requests.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let shutdown = Arc::clone(&self.shutdown);
        let clock = Arc::clone(&self.clock);
        let daily_at = self.daily_at;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Daily scheduler could not start its runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                log::info!("Daily scheduler started, runs at {} UTC", daily_at);

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    let delay = next_run_delay(clock.now(), daily_at);
                    log::debug!("Next daily run in {}s", delay.as_secs());

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {},
                        res = trigger_rx.recv() => match res {
                            Ok(()) => log::info!("Manual daily run triggered"),
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => {
                                log::debug!("Daily scheduler trigger channel closed");
                                break;
                            }
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match dispatcher.run_all_daily() {
                        Ok(acceptance) => log::info!(
                            "Daily run queued {} job(s)",
                            acceptance.accepted_job_ids.len()
                        ),
                        Err(e) => log::error!("Daily run failed: {}", e),
                    }
                }

                log::info!("Daily scheduler stopped");
            });
        })
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::JobConfig;
    use crate::db::Database;
    use crate::dispatch::QueueSink;
    use crate::progress::ProgressTracker;
    use crate::registry::JobRegistry;
    use crate::runs::RunStore;
    use chrono::TimeZone;

    #[test]
    fn test_next_run_delay_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 5, 30, 0).unwrap();
        let at = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert_eq!(next_run_delay(now, at), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_next_run_delay_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert_eq!(next_run_delay(now, at), Duration::from_secs(24 * 3600));

        let now = Utc.with_ymd_and_hms(2026, 2, 28, 23, 0, 0).unwrap();
        assert_eq!(next_run_delay(now, at), Duration::from_secs(7 * 3600));
    }

    #[test]
    fn test_manual_trigger_and_shutdown() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(JobRegistry::new(
            &[JobConfig::new("federal:bills:daily", "openparliament")],
            clock.clone(),
        ));
        let tracker = Arc::new(ProgressTracker::new(clock.clone()));
        let runs = RunStore::new(Database::open_in_memory().unwrap(), clock.clone());
        let queue = Arc::new(QueueSink::new(16));
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            tracker,
            runs,
            queue.clone(),
            clock.clone(),
        ));

        let scheduler = DailyScheduler::new(dispatcher, NaiveTime::from_hms_opt(3, 0, 0).unwrap(), clock);
        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let handle = scheduler.start(trigger_rx);

        trigger_tx.send(()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while queue.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(queue.len(), 1);

        scheduler.stop();
        // Wake the select loop so it sees the shutdown
        let _ = trigger_tx.send(());
        handle.join().expect("scheduler thread panicked");
    }
}
