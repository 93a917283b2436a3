//! Periodic unread-count reconciliation.
//!
//! Runs regardless of push connectivity; when the push channel is down
//! this is the only way the unread count catches up with the server.

use crate::config::PollConfig;
use crate::error::NotifyError;
use crate::service::NotificationService;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Polls the unread count on a fixed interval.
pub struct ReconciliationPoller {
    service: Arc<NotificationService>,
    config: PollConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReconciliationPoller {
    /// Creates a stopped poller.
    pub fn new(service: Arc<NotificationService>, config: PollConfig) -> Self {
        Self {
            service,
            config,
            task: Mutex::new(None),
        }
    }

    /// Starts polling; the first poll happens immediately.
    ///
    /// Returns false if the poller was already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let period = self.config.interval.max(MIN_INTERVAL);
        let service = Arc::clone(&self.service);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match service.fetch_unread_count().await {
                    Ok(count) => debug!(count, "unread count reconciled"),
                    Err(NotifyError::SessionClosed) => break,
                    // Transient failures are retried on the next tick.
                    Err(e) => warn!(error = %e, "unread count poll failed"),
                }
            }
        }));
        info!(interval_secs = period.as_secs(), "reconciliation poller started");
        true
    }

    /// Stops polling. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("reconciliation poller stopped");
        }
    }

    /// Returns true while the polling task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ReconciliationPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for ReconciliationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationPoller")
            .field("interval", &self.config.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
