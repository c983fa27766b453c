//! Error types for jobkit

use thiserror::Error;

use crate::domain::job::JobId;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors reported synchronously by the runner
///
/// Fire-and-forget launches never report what happens to the body; only
/// the wait operations surface `Cancelled`, `TimedOut` and `BodyFailure`.
#[derive(Debug, Error)]
pub enum JobError {
    /// A timeout, policy or configuration value was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The runner's scope was cancelled; no further jobs can be launched
    #[error("Execution scope is cancelled")]
    ScopeCancelled,

    /// No async runtime was available to capture
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// Blocking would stall the runtime thread that has to drive the job
    #[error("Cannot block on a job from a current-thread runtime")]
    BlockingInRuntime,

    /// The job was cancelled before it finished
    #[error("Job {0} was cancelled")]
    Cancelled(JobId),

    /// The job's deadline elapsed before it finished
    #[error("Job {0} timed out")]
    TimedOut(JobId),

    /// The job body returned an error or panicked
    #[error("Job {job_id} failed: {error:#}")]
    BodyFailure {
        /// Job that failed
        job_id: JobId,
        /// Error returned by the body
        error: anyhow::Error,
    },
}

impl JobError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Check if the job ended through a cancellation path
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::TimedOut(_))
    }

    /// Check if the error came from the job body
    pub fn is_body_failure(&self) -> bool {
        matches!(self, Self::BodyFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_body_failure_message_includes_cause() {
        let error = JobError::BodyFailure {
            job_id: Uuid::nil(),
            error: anyhow::anyhow!("disk full").context("writing report"),
        };

        let message = error.to_string();
        assert!(message.contains("writing report"));
        assert!(message.contains("disk full"));
        assert!(error.is_body_failure());
    }

    #[test]
    fn test_cancellation_predicates() {
        assert!(JobError::Cancelled(Uuid::nil()).is_cancellation());
        assert!(JobError::TimedOut(Uuid::nil()).is_cancellation());
        assert!(!JobError::ScopeCancelled.is_cancellation());
        assert!(!JobError::invalid_argument("zero timeout").is_cancellation());
    }
}
