//! Cross-context watchdog
//!
//! A scheduled check of the force-logout signal. A context that signs out
//! converges through its own state update; every other context converges
//! here, within one poll interval of the signal being raised. Detection is
//! bounded by the interval, never immediate.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::controller::SessionController;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct Watchdog {
    handle: JoinHandle<()>,
    interval: Duration,
}

impl Watchdog {
    /// Start polling for `controller`. Must be called from within a tokio
    /// runtime. The task lives until [`Watchdog::stop`] or drop. A zero
    /// interval falls back to [`DEFAULT_POLL_INTERVAL`].
    pub fn spawn(controller: SessionController, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            tracing::warn!(
                fallback_ms = DEFAULT_POLL_INTERVAL.as_millis() as u64,
                "Zero watchdog interval, using default"
            );
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                poll_once(&controller).await;
            }
        });

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Watchdog started");

        Self { handle, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        // Drop aborts
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("Watchdog stopped");
    }
}

/// One watchdog tick. Signs the context out when another context raised
/// the signal while this one still holds a user. Returns whether it did.
pub async fn poll_once(controller: &SessionController) -> bool {
    if !controller.has_user() || !controller.signal().is_set() {
        return false;
    }

    tracing::info!("Force-logout signal observed, signing out this context");
    controller.sign_out().await;
    true
}
