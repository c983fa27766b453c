//! Demo command handler
//!
//! Launches a batch of jobs whose bodies sleep for staggered durations, so a
//! single run shows completions, timeouts and cancellations side by side.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use jobkit_runner::{
    ExecutionPolicy, JobContext, JobHandle, JobRunner, JobSnapshot, JobState, RunnerConfig,
};
use std::time::Duration;
use tracing::{info, warn};

/// Demo arguments
#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Number of jobs to launch
    #[arg(short = 'n', long, default_value_t = 3)]
    pub jobs: u32,

    /// Work time of the first job in milliseconds; job N works N times as long
    #[arg(short, long, default_value_t = 500)]
    pub duration_ms: u64,

    /// Per-job timeout in milliseconds (runner default when omitted)
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Execution policy: pool, io or inline (runner default when omitted)
    #[arg(short, long)]
    pub policy: Option<ExecutionPolicy>,

    /// Launch a timeout callback for every job that hits its deadline
    #[arg(long)]
    pub callback: bool,

    /// Cancel every job still running after this many milliseconds
    #[arg(long)]
    pub cancel_after_ms: Option<u64>,

    /// Print job snapshots as JSON
    #[arg(long)]
    pub json: bool,
}

/// Handle the demo command
pub async fn handle_demo_command(args: DemoArgs, config: RunnerConfig) -> Result<()> {
    let runner = JobRunner::new(config).context("Failed to create job runner")?;

    let jobs = run_demo(&runner, &args).await?;
    let snapshots: Vec<JobSnapshot> = jobs.iter().map(JobHandle::snapshot).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
    } else {
        print_report(&snapshots);
    }

    Ok(())
}

/// Launches the batch and waits until every job and callback has finished
async fn run_demo(runner: &JobRunner, args: &DemoArgs) -> Result<Vec<JobHandle>> {
    let timeout = args.timeout_ms.map(Duration::from_millis);
    let mut jobs = Vec::with_capacity(args.jobs as usize);

    for index in 1..=args.jobs {
        let work = Duration::from_millis(args.duration_ms.saturating_mul(u64::from(index)));
        let body = move |ctx: JobContext| sleeper(ctx, work);

        let job = if args.callback {
            runner.run_fire_and_forget_with_timeout_and_callback(
                args.policy.clone(),
                timeout,
                body,
                on_timeout,
            )
        } else {
            runner.run_fire_and_forget_with_timeout(args.policy.clone(), timeout, body)
        }
        .with_context(|| format!("Failed to launch job {}", index))?;

        jobs.push(job);
    }

    info!(jobs = jobs.len(), "Demo jobs launched");

    if let Some(delay) = args.cancel_after_ms {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        info!(active = runner.active_count(), "Cancelling remaining jobs");
        runner.cancel_all();
    }

    for job in &jobs {
        job.wait().await;
        if let Some(callback) = job.timeout_callback() {
            callback.wait().await;
        }
    }

    Ok(jobs)
}

async fn sleeper(ctx: JobContext, work: Duration) -> jobkit_runner::BodyResult {
    info!(job_id = %ctx.job_id(), work_ms = work.as_millis() as u64, "Job working");
    tokio::time::sleep(work).await;
    info!(job_id = %ctx.job_id(), "Job finished its work");
    Ok(())
}

async fn on_timeout(ctx: JobContext) -> jobkit_runner::BodyResult {
    warn!(callback_id = %ctx.job_id(), "Timeout callback running");
    Ok(())
}

/// Print one line per job, with its callback underneath
fn print_report(snapshots: &[JobSnapshot]) {
    if snapshots.is_empty() {
        println!("{}", "No jobs launched.".yellow());
        return;
    }

    println!("{}", format!("Ran {} job(s):", snapshots.len()).bold());
    println!();
    for snapshot in snapshots {
        print_job_summary(snapshot);
    }
}

fn print_job_summary(snapshot: &JobSnapshot) {
    println!("  {} Job {}", "▸".cyan(), snapshot.id.to_string().dimmed());
    println!("    Status:   {}", colorize_state(snapshot.state));
    println!("    Policy:   {}", snapshot.policy);
    if let Some(timeout) = snapshot.timeout_ms {
        println!("    Timeout:  {}ms", timeout);
    }
    if let Some(duration) = snapshot.duration_ms() {
        println!("    Duration: {}ms", duration);
    }
    if let Some(error) = &snapshot.error_message {
        println!("    Error:    {}", error.red());
    }
    if let Some(callback) = &snapshot.timeout_callback {
        println!(
            "    Callback: {} {}",
            colorize_state(callback.state),
            callback.id.to_string().dimmed()
        );
    }
    println!();
}

/// Colorize job state for display
fn colorize_state(state: JobState) -> colored::ColoredString {
    let state_str = state.as_str();
    match state {
        JobState::Created => state_str.yellow(),
        JobState::Running => state_str.cyan(),
        JobState::Completed => state_str.green(),
        JobState::Failed => state_str.red(),
        JobState::Cancelled => state_str.dimmed(),
        JobState::TimedOut => state_str.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DemoArgs {
        DemoArgs {
            jobs: 3,
            duration_ms: 100,
            timeout_ms: None,
            policy: None,
            callback: false,
            cancel_after_ms: None,
            json: false,
        }
    }

    fn states(jobs: &[JobHandle]) -> Vec<JobState> {
        jobs.iter().map(JobHandle::state).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_staggers_timeouts() {
        let runner = JobRunner::new(RunnerConfig::default()).unwrap();
        let args = DemoArgs {
            timeout_ms: Some(250),
            callback: true,
            ..args()
        };

        let jobs = run_demo(&runner, &args).await.unwrap();

        assert_eq!(
            states(&jobs),
            vec![JobState::Completed, JobState::Completed, JobState::TimedOut]
        );
        assert!(jobs[0].timeout_callback().is_none());
        let callback = jobs[2].timeout_callback().unwrap();
        assert_eq!(callback.state(), JobState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_cancel_after() {
        let runner = JobRunner::new(RunnerConfig::default()).unwrap();
        let args = DemoArgs {
            cancel_after_ms: Some(150),
            ..args()
        };

        let jobs = run_demo(&runner, &args).await.unwrap();

        assert_eq!(
            states(&jobs),
            vec![JobState::Completed, JobState::Cancelled, JobState::Cancelled]
        );
        assert!(runner.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_honours_policy() {
        let runner = JobRunner::new(RunnerConfig::default()).unwrap();
        let args = DemoArgs {
            jobs: 1,
            policy: Some(ExecutionPolicy::Inline),
            ..args()
        };

        let jobs = run_demo(&runner, &args).await.unwrap();

        assert_eq!(jobs[0].policy(), &ExecutionPolicy::Inline);
        assert_eq!(jobs[0].state(), JobState::Completed);
    }

    #[test]
    fn test_colorize_state_keeps_label() {
        colored::control::set_override(false);
        assert_eq!(colorize_state(JobState::TimedOut).to_string(), "timed_out");
    }
}
