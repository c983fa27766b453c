//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, JobState};

/// Point-in-time view of a launched job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub state: JobState,
    /// Name of the execution policy the job was launched with
    pub policy: String,
    /// Effective timeout in milliseconds, `None` for jobs without a deadline
    pub timeout_ms: Option<u64>,
    pub launched_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message when the body failed
    pub error_message: Option<String>,
    /// Snapshot of the timeout callback job, once it has been launched
    pub timeout_callback: Option<Box<JobSnapshot>>,
}

impl JobSnapshot {
    /// Time between launch and the terminal transition, if finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| finished.signed_duration_since(self.launched_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot(state: JobState) -> JobSnapshot {
        let launched_at = Utc::now();
        JobSnapshot {
            id: Uuid::new_v4(),
            state,
            policy: "pool".to_string(),
            timeout_ms: Some(10_000),
            launched_at,
            finished_at: None,
            error_message: None,
            timeout_callback: None,
        }
    }

    #[test]
    fn test_duration_only_for_finished_jobs() {
        let mut snap = snapshot(JobState::Running);
        assert_eq!(snap.duration_ms(), None);

        snap.state = JobState::Completed;
        snap.finished_at = Some(snap.launched_at + chrono::Duration::milliseconds(1_500));
        assert_eq!(snap.duration_ms(), Some(1_500));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snap = snapshot(JobState::TimedOut);
        let value = serde_json::to_value(&snap).unwrap();

        assert_eq!(value["state"], "timed_out");
        assert_eq!(value["policy"], "pool");
        assert_eq!(value["timeout_ms"], 10_000);
        assert!(value["timeout_callback"].is_null());
    }
}
