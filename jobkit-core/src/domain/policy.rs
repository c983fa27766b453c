//! Execution policy
//!
//! An execution policy selects where a job's code runs. The runner resolves
//! each policy to a [`Dispatcher`] backed by the async runtime; custom
//! policies carry their own dispatcher.

use futures::future::BoxFuture;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::JobError;

/// A job, already wrapped with its cancellation and timeout handling
pub type Task = BoxFuture<'static, ()>;

/// Execution substrate capable of driving a [`Task`] to completion
///
/// Implementations must not run the task synchronously to completion inside
/// `dispatch` unless they are explicitly inline; callers rely on launches
/// returning promptly.
pub trait Dispatcher: Send + Sync + fmt::Debug {
    /// Name used in logs and snapshots
    fn name(&self) -> &str;

    /// Schedules the task
    fn dispatch(&self, task: Task);
}

/// Selector of where a job runs
#[derive(Clone, Debug, Default)]
pub enum ExecutionPolicy {
    /// The runtime's worker pool
    #[default]
    Pool,
    /// The runtime's blocking pool, for bodies dominated by blocking I/O
    Io,
    /// Runs on the launching thread until the first suspension point, then
    /// continues on the worker pool
    Inline,
    /// Caller-supplied substrate
    Custom(Arc<dyn Dispatcher>),
}

impl ExecutionPolicy {
    /// Wraps a custom dispatcher
    pub fn custom(dispatcher: impl Dispatcher + 'static) -> Self {
        ExecutionPolicy::Custom(Arc::new(dispatcher))
    }

    /// Name of the policy (the dispatcher name for custom policies)
    pub fn name(&self) -> &str {
        match self {
            ExecutionPolicy::Pool => "pool",
            ExecutionPolicy::Io => "io",
            ExecutionPolicy::Inline => "inline",
            ExecutionPolicy::Custom(dispatcher) => dispatcher.name(),
        }
    }

    /// Whether the policy is a caller-supplied dispatcher
    pub fn is_custom(&self) -> bool {
        matches!(self, ExecutionPolicy::Custom(_))
    }
}

/// Custom policies compare by dispatcher identity
impl PartialEq for ExecutionPolicy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExecutionPolicy::Pool, ExecutionPolicy::Pool)
            | (ExecutionPolicy::Io, ExecutionPolicy::Io)
            | (ExecutionPolicy::Inline, ExecutionPolicy::Inline) => true,
            (ExecutionPolicy::Custom(a), ExecutionPolicy::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for ExecutionPolicy {}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionPolicy {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" | "default" => Ok(ExecutionPolicy::Pool),
            "io" => Ok(ExecutionPolicy::Io),
            "inline" | "unconfined" => Ok(ExecutionPolicy::Inline),
            other => Err(JobError::InvalidArgument(format!(
                "unknown execution policy '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct DroppingDispatcher;

    impl Dispatcher for DroppingDispatcher {
        fn name(&self) -> &str {
            "dropping"
        }

        fn dispatch(&self, _task: Task) {}
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("pool".parse::<ExecutionPolicy>().unwrap(), ExecutionPolicy::Pool);
        assert_eq!("IO".parse::<ExecutionPolicy>().unwrap(), ExecutionPolicy::Io);
        assert_eq!(
            " unconfined ".parse::<ExecutionPolicy>().unwrap(),
            ExecutionPolicy::Inline
        );
        assert!("gpu".parse::<ExecutionPolicy>().is_err());
    }

    #[test]
    fn test_custom_policies_compare_by_identity() {
        let a = ExecutionPolicy::custom(DroppingDispatcher);
        let b = ExecutionPolicy::custom(DroppingDispatcher);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.name(), "dropping");
        assert!(a.is_custom());
    }

    #[test]
    fn test_default_policy_is_pool() {
        assert_eq!(ExecutionPolicy::default(), ExecutionPolicy::Pool);
        assert_eq!(ExecutionPolicy::default().to_string(), "pool");
    }
}
