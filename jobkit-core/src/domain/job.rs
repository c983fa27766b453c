//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a launched job
pub type JobId = Uuid;

/// Value returned by a job body or a timeout callback
///
/// Errors are swallowed by the fire-and-forget launches and only surface
/// through the blocking wait operations.
pub type BodyResult = anyhow::Result<()>;

/// Lifecycle state of a launched job
///
/// ```text
/// Created ──► Running ──► Completed | Failed | Cancelled | TimedOut
///    └──────────────────► Cancelled | TimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Handle returned, body not yet scheduled
    Created,
    /// Body executing on its dispatcher
    Running,
    /// Body returned `Ok(())`
    Completed,
    /// Body returned an error or panicked
    Failed,
    /// Cancelled by the handle owner or by scope cancellation
    Cancelled,
    /// Cancelled because the deadline elapsed
    TimedOut,
}

impl JobState {
    /// Whether no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled | JobState::TimedOut
        )
    }

    /// Whether the job is still created or running
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether the job ended through any cancellation path, timeout included
    pub fn is_cancelled(self) -> bool {
        matches!(self, JobState::Cancelled | JobState::TimedOut)
    }

    /// Lowercase name used in logs and reports
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
            JobState::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Created.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::TimedOut.is_terminal());
    }

    #[test]
    fn test_timeout_counts_as_cancellation() {
        assert!(JobState::TimedOut.is_cancelled());
        assert!(JobState::Cancelled.is_cancelled());
        assert!(!JobState::Failed.is_cancelled());
        assert!(!JobState::Completed.is_cancelled());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&JobState::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        assert_eq!(JobState::TimedOut.to_string(), "timed_out");
    }
}
