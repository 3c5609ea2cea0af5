//! Phase chain workers.
//!
//! Collaborators block, so each chain runs on the blocking thread pool. A
//! semaphore bounds how many chains run at once.

use std::sync::Arc;

use netintent_store::IntentData;
use tokio::sync::Semaphore;

use crate::dispatch::{new_initial_phase, new_replace_phase, process};
use crate::error::{ControlError, Result};
use crate::phase::FinalIntentProcessPhase;
use crate::processor::PhaseContext;

/// One reconciliation: the new record, the stored record it is reconciled
/// against, and for replacements the installed record being replaced.
#[derive(Debug)]
pub struct IntentWorker {
    ctx: PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
    replaced: Option<IntentData>,
}

impl IntentWorker {
    /// Create a worker for a plain request.
    #[must_use]
    pub fn new(ctx: PhaseContext, data: IntentData, stored: Option<IntentData>) -> Self {
        Self {
            ctx,
            data,
            stored,
            replaced: None,
        }
    }

    /// Create a worker that installs `data` in place of `replaced`.
    #[must_use]
    pub fn replacing(
        ctx: PhaseContext,
        data: IntentData,
        stored: Option<IntentData>,
        replaced: IntentData,
    ) -> Self {
        Self {
            ctx,
            data,
            stored,
            replaced: Some(replaced),
        }
    }

    /// Run the chain to completion on the current thread.
    #[must_use]
    pub fn call(self) -> FinalIntentProcessPhase {
        let initial = match self.replaced {
            Some(replaced) => new_replace_phase(&self.ctx, self.data, self.stored, replaced),
            None => new_initial_phase(&self.ctx, self.data, self.stored),
        };
        process(initial)
    }
}

/// Bounded pool running workers on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` chains at once.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrent chains.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of idle slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `worker` once a slot is free.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Worker` if the pool is closed or the chain
    /// panicked.
    pub async fn run(&self, worker: IntentWorker) -> Result<FinalIntentProcessPhase> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ControlError::Worker(format!("worker pool closed: {e}")))?;

        let span = tracing::debug_span!("intent_worker", key = %worker.data.key());
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            span.in_scope(|| worker.call())
        });

        handle
            .await
            .map_err(|e| ControlError::Worker(format!("worker task failed: {e}")))
    }
}
