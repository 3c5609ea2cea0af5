//! Periodic retry of failed and corrupt intents.
//!
//! The phase machine never retries on its own. `IntentCleanup` scans the store
//! for FAILED and CORRUPT records and resubmits the request each was driving,
//! until the record's error count reaches the configured threshold.

use std::sync::Arc;
use std::time::Duration;

use netintent_store::{IntentState, Store};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::service::IntentManager;

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Records resubmitted.
    pub resubmitted: usize,
    /// Records left alone because they reached the retry threshold.
    pub abandoned: usize,
}

/// Resubmits failed and corrupt intents.
pub struct IntentCleanup<S: Store> {
    manager: Arc<IntentManager<S>>,
    period: Duration,
    retry_threshold: u32,
}

impl<S: Store + 'static> IntentCleanup<S> {
    /// Create a cleanup task using the manager's configuration.
    #[must_use]
    pub fn new(manager: Arc<IntentManager<S>>) -> Self {
        let period = manager.config().cleanup_period();
        let retry_threshold = manager.config().retry_threshold;
        Self {
            manager,
            period,
            retry_threshold,
        }
    }

    /// Override the retry threshold.
    #[must_use]
    pub const fn with_retry_threshold(mut self, retry_threshold: u32) -> Self {
        self.retry_threshold = retry_threshold;
        self
    }

    /// Run one pass over the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be scanned. Failed resubmissions
    /// are logged and do not abort the pass.
    pub async fn run_once(&self) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        for state in [IntentState::Failed, IntentState::Corrupt] {
            for data in self.manager.store().list_intent_data_by_state(state)? {
                if data.error_count >= self.retry_threshold {
                    warn!(
                        key = %data.key(),
                        state = %data.state,
                        errors = data.error_count,
                        "Retry threshold reached; leaving intent for manual remediation"
                    );
                    report.abandoned += 1;
                    continue;
                }

                debug!(
                    key = %data.key(),
                    request = %data.request,
                    errors = data.error_count,
                    "Resubmitting intent"
                );
                match self.manager.resubmit(&data).await {
                    Ok(_) => report.resubmitted += 1,
                    Err(e) => error!(key = %data.key(), error = %e, "Resubmission failed"),
                }
            }
        }

        if report.resubmitted > 0 || report.abandoned > 0 {
            info!(
                resubmitted = report.resubmitted,
                abandoned = report.abandoned,
                "Cleanup pass finished"
            );
        }
        Ok(report)
    }

    /// Run passes forever on the configured period.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?self.period, "Intent cleanup started");

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "Cleanup pass failed");
                }
            }
        })
    }
}
