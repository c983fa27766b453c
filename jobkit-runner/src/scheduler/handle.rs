//! Job handles
//!
//! A [`JobHandle`] is the caller's view of one launched job. All clones share
//! the same state, which lives in a `watch` channel so that transitions are
//! linearized and waiters are woken on the terminal one.

use chrono::{DateTime, Utc};
use jobkit_core::domain::{ExecutionPolicy, JobId, JobState};
use jobkit_core::dto::JobSnapshot;
use jobkit_core::{JobError, Result};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

struct JobShared {
    id: JobId,
    policy: ExecutionPolicy,
    timeout: Option<Duration>,
    launched_at: DateTime<Utc>,
    finished_at: OnceLock<DateTime<Utc>>,
    state: watch::Sender<JobState>,
    token: CancellationToken,
    error: Mutex<Option<anyhow::Error>>,
    error_message: OnceLock<String>,
    timeout_callback: OnceLock<JobHandle>,
}

/// Reference to a launched job
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub(crate) fn new(
        policy: ExecutionPolicy,
        timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(JobState::Created);
        Self {
            shared: Arc::new(JobShared {
                id: Uuid::new_v4(),
                policy,
                timeout,
                launched_at: Utc::now(),
                finished_at: OnceLock::new(),
                state,
                token,
                error: Mutex::new(None),
                error_message: OnceLock::new(),
                timeout_callback: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.shared.id
    }

    pub fn state(&self) -> JobState {
        *self.shared.state.borrow()
    }

    /// Whether the job is created or running
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Whether the job ended cancelled or timed out
    pub fn is_cancelled(&self) -> bool {
        self.state().is_cancelled()
    }

    /// Policy the job was launched with
    pub fn policy(&self) -> &ExecutionPolicy {
        &self.shared.policy
    }

    /// Effective timeout, `None` for jobs without a deadline
    pub fn timeout(&self) -> Option<Duration> {
        self.shared.timeout
    }

    pub fn launched_at(&self) -> DateTime<Utc> {
        self.shared.launched_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.shared.finished_at.get().copied()
    }

    /// Handle of the timeout callback, once the deadline fired and launched it
    pub fn timeout_callback(&self) -> Option<JobHandle> {
        self.shared.timeout_callback.get().cloned()
    }

    /// Requests cancellation
    ///
    /// The handle becomes `Cancelled` immediately unless the job already
    /// finished; the body is dropped at its next suspension point. Returns
    /// whether this call cancelled the job.
    pub fn cancel(&self) -> bool {
        let cancelled = self.finish(JobState::Cancelled);
        self.shared.token.cancel();
        if cancelled {
            debug!(job_id = %self.id(), "Job cancelled");
        }
        cancelled
    }

    /// Waits for the terminal state
    pub async fn wait(&self) -> JobState {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // The sender lives as long as this handle
            Err(_) => self.state(),
        }
    }

    /// Takes the body's error, if the job failed and nobody took it yet
    pub fn take_error(&self) -> Option<anyhow::Error> {
        self.shared
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Converts a terminal state into the wait operations' result
    pub(crate) fn outcome(&self) -> Result<()> {
        match self.state() {
            JobState::Completed => Ok(()),
            JobState::Cancelled => Err(JobError::Cancelled(self.id())),
            JobState::TimedOut => Err(JobError::TimedOut(self.id())),
            JobState::Failed => Err(JobError::BodyFailure {
                job_id: self.id(),
                error: self.take_error().unwrap_or_else(|| {
                    anyhow::anyhow!(
                        "{}",
                        self.shared
                            .error_message
                            .get()
                            .map(String::as_str)
                            .unwrap_or("job failed")
                    )
                }),
            }),
            // Only called after `wait`
            JobState::Created | JobState::Running => Err(JobError::invalid_argument(format!(
                "job {} has not finished",
                self.id()
            ))),
        }
    }

    /// Point-in-time view for reporting
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id(),
            state: self.state(),
            policy: self.policy().name().to_string(),
            timeout_ms: self.timeout().map(|t| t.as_millis() as u64),
            launched_at: self.launched_at(),
            finished_at: self.finished_at(),
            error_message: self.shared.error_message.get().cloned(),
            timeout_callback: self
                .timeout_callback()
                .map(|callback| Box::new(callback.snapshot())),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.shared.token
    }

    /// `Created → Running`; false if the job was cancelled before it started
    pub(crate) fn start(&self) -> bool {
        self.shared.state.send_if_modified(|state| {
            if *state == JobState::Created {
                *state = JobState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Moves to a terminal state unless one was already reached
    pub(crate) fn finish(&self, terminal: JobState) -> bool {
        self.finish_with(terminal, || {})
    }

    /// Records the body's error and moves to `Failed`
    ///
    /// The error is discarded if the job already reached a terminal state.
    pub(crate) fn fail(&self, error: anyhow::Error) -> bool {
        let shared = &self.shared;
        let message = format!("{:#}", error);
        self.finish_with(JobState::Failed, move || {
            let _ = shared.error_message.set(message);
            *shared.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
        })
    }

    /// Terminal transition; `on_win` runs under the state lock, before waiters wake
    fn finish_with(&self, terminal: JobState, on_win: impl FnOnce()) -> bool {
        debug_assert!(terminal.is_terminal());
        let finished_at = &self.shared.finished_at;
        self.shared.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = terminal;
            let _ = finished_at.set(Utc::now());
            on_win();
            true
        })
    }

    /// Moves to `TimedOut`, attaching the timeout callback's handle in the
    /// same transition
    pub(crate) fn time_out(&self, callback: Option<JobHandle>) -> bool {
        let slot = &self.shared.timeout_callback;
        self.finish_with(JobState::TimedOut, move || {
            if let Some(callback) = callback {
                let _ = slot.set(callback);
            }
        })
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("policy", &self.policy().name())
            .field("timeout", &self.timeout())
            .finish()
    }
}
