//! Jobkit Runner
//!
//! Launches asynchronous jobs on a tokio runtime with per-job execution
//! policies, timeouts and scope-wide cancellation.
//!
//! Architecture:
//! - Configuration: Default policy and timeout, from code or environment
//! - Dispatch: Maps execution policies onto the runtime
//! - Scheduler: Job handles, the execution scope and the runner itself
//! - Context: What a running body can see of its own job
//!
//! ```no_run
//! use jobkit_runner::{JobRunner, RunnerConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> jobkit_runner::Result<()> {
//! let runner = JobRunner::new(RunnerConfig::default())?;
//! let job = runner.run_fire_and_forget_with_timeout(None, Some(Duration::from_secs(5)), |ctx| async move {
//!     tracing::info!(job_id = %ctx.job_id(), "working");
//!     Ok(())
//! })?;
//! job.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod scheduler;

pub use config::RunnerConfig;
pub use context::JobContext;
pub use scheduler::{ExecutionScope, JobHandle, JobRunner};

pub use jobkit_core::domain::{BodyResult, Dispatcher, ExecutionPolicy, JobId, JobState, Task};
pub use jobkit_core::dto::JobSnapshot;
pub use jobkit_core::{JobError, Result};
