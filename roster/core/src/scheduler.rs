//! Tick scheduler
//!
//! Drives [`SessionManager::tick`] on a fixed period from a tokio task. Late
//! ticks are skipped rather than bunched, so a slow render never causes a
//! burst of catch-up renders.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::manager::SessionManager;

/// Periodic driver for a [`SessionManager`]
#[derive(Debug)]
pub struct Scheduler;

impl Scheduler {
    /// Start ticking `manager` every `period`
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(manager: Arc<SessionManager>, period: Duration) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = 0u64;

            tracing::info!(period_ms = period.as_millis() as u64, "Scheduler started");
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let report = manager.tick();
                        ticks += 1;
                        if !report.failed.is_empty() {
                            tracing::debug!(
                                tick = ticks,
                                failed = report.failed.len(),
                                "Tick had undelivered batches"
                            );
                        }
                    }
                }
            }
            tracing::info!(ticks, "Scheduler stopped");
            ticks
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Whether the scheduler task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop ticking and wait for the task to exit
    ///
    /// Returns the number of ticks run; 0 if the task panicked.
    pub async fn shutdown(self) -> u64 {
        let _ = self.shutdown_tx.send(true);
        match self.task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                tracing::error!(error = %e, "Scheduler task failed");
                0
            }
        }
    }
}
