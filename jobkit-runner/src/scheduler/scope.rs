//! Execution scope
//!
//! The scope owns every active job launched by one runner. Registration and
//! cancellation take the same lock: a launch racing `cancel` either registers
//! first and is cancelled with the rest, or sees the cancelled scope and is
//! rejected.

use jobkit_core::domain::JobId;
use jobkit_core::{JobError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::handle::JobHandle;

/// Cancellable group of jobs
#[derive(Debug, Default)]
pub struct ExecutionScope {
    token: CancellationToken,
    jobs: Mutex<HashMap<JobId, JobHandle>>,
}

impl ExecutionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scope was cancelled; a cancelled scope accepts no jobs
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token for a new job, cancelled together with the scope
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Adds a job to the scope
    pub(crate) fn register(&self, handle: &JobHandle) -> Result<()> {
        let mut jobs = self.lock_jobs();
        if self.token.is_cancelled() {
            return Err(JobError::ScopeCancelled);
        }
        jobs.insert(handle.id(), handle.clone());
        Ok(())
    }

    /// Removes a finished job
    pub(crate) fn release(&self, job_id: JobId) {
        if self.lock_jobs().remove(&job_id).is_some() {
            debug!(job_id = %job_id, "Job released from scope");
        }
    }

    /// Cancels the scope and every job it owns
    ///
    /// Returns the number of jobs this call cancelled. Calling it again has
    /// no further effect.
    pub fn cancel(&self) -> usize {
        let owned: Vec<JobHandle> = {
            let mut jobs = self.lock_jobs();
            if self.token.is_cancelled() {
                return 0;
            }
            self.token.cancel();
            jobs.drain().map(|(_, handle)| handle).collect()
        };

        let cancelled = owned.iter().filter(|handle| handle.cancel()).count();
        info!(owned = owned.len(), cancelled, "Execution scope cancelled");
        cancelled
    }

    /// Jobs that have not finished yet
    pub fn active_jobs(&self) -> Vec<JobHandle> {
        self.lock_jobs().values().cloned().collect()
    }

    /// Number of jobs that have not finished yet
    pub fn len(&self) -> usize {
        self.lock_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobHandle>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
