//! Job runner
//!
//! Launches jobs under one shared [`ExecutionScope`], applying the runner's
//! default policy and timeout unless a launch overrides them.
//!
//! Every launch goes through [`spawn_job`]: the handle is registered with the
//! scope, the body is wrapped with the cancellation/deadline race, and the
//! wrapped task is handed to the dispatcher selected by the policy.

use futures::FutureExt;
use futures::future::BoxFuture;
use jobkit_core::domain::{BodyResult, Dispatcher, ExecutionPolicy, JobState};
use jobkit_core::{JobError, Result};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::handle::JobHandle;
use super::scope::ExecutionScope;
use crate::config::{RunnerConfig, validate_timeout};
use crate::context::JobContext;
use crate::dispatch::Dispatchers;

/// Type-erased job body
type BoxedBody = Box<dyn FnOnce(JobContext) -> BoxFuture<'static, BodyResult> + Send>;

fn boxed<F, Fut>(body: F) -> BoxedBody
where
    F: FnOnce(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = BodyResult> + Send + 'static,
{
    Box::new(move |ctx| body(ctx).boxed())
}

#[derive(Debug, Clone)]
struct JobDefaults {
    policy: ExecutionPolicy,
    timeout: Duration,
}

struct RunnerInner {
    scope: Arc<ExecutionScope>,
    defaults: RwLock<JobDefaults>,
    dispatchers: Dispatchers,
}

impl Drop for RunnerInner {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Launches jobs under one cancellable scope
///
/// Clones share the scope and the defaults. Dropping the last clone cancels
/// every job still running.
///
/// Bodies receive a [`JobContext`] and return [`BodyResult`]. A cancelled or
/// timed-out body is dropped at its next `.await`; bodies that compute for a
/// long time between awaits must check [`JobContext::checkpoint`].
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<RunnerInner>,
}

impl JobRunner {
    /// Creates a runner on the current tokio runtime
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| JobError::NoRuntime(e.to_string()))?;
        Self::with_handle(config, handle)
    }

    /// Creates a runner dispatching onto the given runtime
    pub fn with_handle(config: RunnerConfig, handle: Handle) -> Result<Self> {
        config.validate()?;
        debug!(
            policy = %config.default_policy,
            timeout_ms = config.default_timeout.as_millis() as u64,
            "Creating job runner"
        );

        Ok(Self {
            inner: Arc::new(RunnerInner {
                scope: Arc::new(ExecutionScope::new()),
                defaults: RwLock::new(JobDefaults {
                    policy: config.default_policy,
                    timeout: config.default_timeout,
                }),
                dispatchers: Dispatchers::new(handle),
            }),
        })
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    pub fn default_policy(&self) -> ExecutionPolicy {
        self.defaults().policy
    }

    /// Replaces the policy used by later launches without an override
    pub fn set_default_policy(&self, policy: ExecutionPolicy) {
        debug!(policy = %policy, "Default policy changed");
        self.inner
            .defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .policy = policy;
    }

    pub fn default_timeout(&self) -> Duration {
        self.defaults().timeout
    }

    /// Replaces the timeout used by later timed launches without an override
    pub fn set_default_timeout(&self, timeout: Duration) -> Result<()> {
        validate_timeout(timeout)?;
        debug!(timeout_ms = timeout.as_millis() as u64, "Default timeout changed");
        self.inner
            .defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .timeout = timeout;
        Ok(())
    }

    fn defaults(&self) -> JobDefaults {
        self.inner
            .defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Fire and forget
    // =========================================================================

    /// Starts `body` without a deadline
    pub fn run_fire_and_forget<F, Fut>(
        &self,
        policy: Option<ExecutionPolicy>,
        body: F,
    ) -> Result<JobHandle>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        let policy = policy.unwrap_or_else(|| self.default_policy());
        self.launch(policy, None, boxed(body), None)
    }

    /// Starts `body`, cancelling it silently once the timeout elapses
    ///
    /// A timed-out job ends in [`JobState::TimedOut`]; nothing is reported to
    /// the caller beyond the handle's state.
    pub fn run_fire_and_forget_with_timeout<F, Fut>(
        &self,
        policy: Option<ExecutionPolicy>,
        timeout: Option<Duration>,
        body: F,
    ) -> Result<JobHandle>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        let (policy, timeout) = self.resolve(policy, timeout)?;
        self.launch(policy, Some(timeout), boxed(body), None)
    }

    /// Like [`run_fire_and_forget_with_timeout`](Self::run_fire_and_forget_with_timeout),
    /// launching `on_timeout` as its own job when, and only when, the deadline
    /// ends the body
    ///
    /// The callback runs under the same scope and policy, without a timeout.
    /// Its handle is available through [`JobHandle::timeout_callback`].
    pub fn run_fire_and_forget_with_timeout_and_callback<F, Fut, C, CFut>(
        &self,
        policy: Option<ExecutionPolicy>,
        timeout: Option<Duration>,
        body: F,
        on_timeout: C,
    ) -> Result<JobHandle>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
        C: FnOnce(JobContext) -> CFut + Send + 'static,
        CFut: Future<Output = BodyResult> + Send + 'static,
    {
        let (policy, timeout) = self.resolve(policy, timeout)?;
        self.launch(policy, Some(timeout), boxed(body), Some(boxed(on_timeout)))
    }

    // =========================================================================
    // Run and wait
    // =========================================================================

    /// Starts `body` and blocks the calling thread until it finishes
    ///
    /// Returns the body's error as [`JobError::BodyFailure`], or
    /// [`JobError::Cancelled`] if the scope was cancelled meanwhile. Must not
    /// be called from a current-thread runtime, which could not drive the job
    /// while blocked.
    pub fn run_fire_and_wait<F, Fut>(&self, policy: Option<ExecutionPolicy>, body: F) -> Result<()>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        ensure_can_block()?;
        let handle = self.run_fire_and_forget(policy, body)?;
        block_until_finished(&handle);
        handle.outcome()
    }

    /// Blocking run with a deadline; a timed-out body yields [`JobError::TimedOut`]
    pub fn run_fire_and_wait_with_timeout<F, Fut>(
        &self,
        policy: Option<ExecutionPolicy>,
        timeout: Option<Duration>,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        ensure_can_block()?;
        let handle = self.run_fire_and_forget_with_timeout(policy, timeout, body)?;
        block_until_finished(&handle);
        handle.outcome()
    }

    /// Async counterpart of [`run_fire_and_wait`](Self::run_fire_and_wait)
    pub async fn run_and_wait<F, Fut>(&self, policy: Option<ExecutionPolicy>, body: F) -> Result<()>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        let handle = self.run_fire_and_forget(policy, body)?;
        handle.wait().await;
        handle.outcome()
    }

    /// Async counterpart of [`run_fire_and_wait_with_timeout`](Self::run_fire_and_wait_with_timeout)
    pub async fn run_and_wait_with_timeout<F, Fut>(
        &self,
        policy: Option<ExecutionPolicy>,
        timeout: Option<Duration>,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        let handle = self.run_fire_and_forget_with_timeout(policy, timeout, body)?;
        handle.wait().await;
        handle.outcome()
    }

    // =========================================================================
    // Scope
    // =========================================================================

    /// Cancels every job owned by the runner, running or not yet started
    ///
    /// Later launches fail with [`JobError::ScopeCancelled`]. Idempotent.
    pub fn cancel_all(&self) {
        self.inner.scope.cancel();
    }

    /// Whether [`cancel_all`](Self::cancel_all) was called
    pub fn is_cancelled(&self) -> bool {
        self.inner.scope.is_cancelled()
    }

    /// Jobs that have not reached a terminal state
    pub fn active_jobs(&self) -> Vec<JobHandle> {
        self.inner.scope.active_jobs()
    }

    pub fn active_count(&self) -> usize {
        self.inner.scope.len()
    }

    fn resolve(
        &self,
        policy: Option<ExecutionPolicy>,
        timeout: Option<Duration>,
    ) -> Result<(ExecutionPolicy, Duration)> {
        let defaults = self.defaults();
        let timeout = match timeout {
            Some(timeout) => {
                validate_timeout(timeout)?;
                timeout
            }
            None => defaults.timeout,
        };
        Ok((policy.unwrap_or(defaults.policy), timeout))
    }

    fn launch(
        &self,
        policy: ExecutionPolicy,
        timeout: Option<Duration>,
        body: BoxedBody,
        on_timeout: Option<BoxedBody>,
    ) -> Result<JobHandle> {
        let dispatchers = &self.inner.dispatchers;
        let callback = on_timeout.map(|callback| PendingCallback {
            dispatcher: dispatchers.resolve_deferred(&policy),
            body: callback,
        });

        spawn_job(
            &self.inner.scope,
            dispatchers.resolve(&policy),
            policy,
            timeout,
            body,
            callback,
        )
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let defaults = self.defaults();
        f.debug_struct("JobRunner")
            .field("default_policy", &defaults.policy.name())
            .field("default_timeout", &defaults.timeout)
            .field("active_jobs", &self.active_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Timeout callback waiting for its job's deadline
struct PendingCallback {
    dispatcher: Arc<dyn Dispatcher>,
    body: BoxedBody,
}

/// How the race between body, cancellation and deadline ended
enum Outcome {
    Cancelled,
    Expired,
    Finished(std::result::Result<BodyResult, Box<dyn Any + Send>>),
}

/// Creates a job, registers it with the scope and dispatches it
fn spawn_job(
    scope: &Arc<ExecutionScope>,
    dispatcher: Arc<dyn Dispatcher>,
    policy: ExecutionPolicy,
    timeout: Option<Duration>,
    body: BoxedBody,
    on_timeout: Option<PendingCallback>,
) -> Result<JobHandle> {
    let handle = JobHandle::new(policy, timeout, scope.child_token());
    submit(scope, dispatcher, handle.clone(), body, on_timeout)?;
    Ok(handle)
}

/// Registers an already created job and hands its task to the dispatcher
fn submit(
    scope: &Arc<ExecutionScope>,
    dispatcher: Arc<dyn Dispatcher>,
    handle: JobHandle,
    body: BoxedBody,
    on_timeout: Option<PendingCallback>,
) -> Result<()> {
    // The deadline counts from launch, not from when the dispatcher starts the body
    let deadline = handle
        .timeout()
        .and_then(|timeout| Instant::now().checked_add(timeout));

    if let Err(e) = scope.register(&handle) {
        warn!(policy = %handle.policy(), "Launch rejected: {}", e);
        return Err(e);
    }

    debug!(
        job_id = %handle.id(),
        policy = %handle.policy(),
        timeout_ms = handle.timeout().map(|t| t.as_millis() as u64),
        "Job launched"
    );

    let guard = JobGuard {
        handle,
        scope: Arc::clone(scope),
    };
    dispatcher.dispatch(run_job(guard, deadline, body, on_timeout).boxed());

    Ok(())
}

/// Keeps a job's handle and scope entry consistent with its task
///
/// Dropped when the task finishes or is dropped unfinished: a task that never
/// reached a terminal state (runtime shutdown, a dispatcher discarding it)
/// ends `Cancelled`. Either way the job leaves the scope.
struct JobGuard {
    handle: JobHandle,
    scope: Arc<ExecutionScope>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.handle.finish(JobState::Cancelled) {
            self.handle.token().cancel();
            debug!(job_id = %self.handle.id(), "Job task dropped before finishing");
        }
        self.scope.release(self.handle.id());
    }
}

/// The task a dispatcher drives for one job
async fn run_job(
    guard: JobGuard,
    deadline: Option<Instant>,
    body: BoxedBody,
    on_timeout: Option<PendingCallback>,
) {
    let JobGuard { handle, scope } = &guard;
    let job_id = handle.id();

    if !handle.start() {
        debug!(job_id = %job_id, "Job cancelled before it started");
        return;
    }

    let token = handle.token().clone();
    let ctx = JobContext::new(job_id, token.clone());
    let expiry = async move {
        match deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => Outcome::Cancelled,
        _ = expiry => Outcome::Expired,
        result = AssertUnwindSafe(body(ctx)).catch_unwind() => Outcome::Finished(result),
    };

    match outcome {
        Outcome::Cancelled => {
            // Scope cancellation reaches the token before it reaches the handle
            handle.finish(JobState::Cancelled);
        }
        Outcome::Expired => {
            // The callback's handle is attached in the same transition, so
            // anyone woken by `TimedOut` already sees it
            let callback = on_timeout.map(|pending| {
                let callback = JobHandle::new(handle.policy().clone(), None, scope.child_token());
                (callback, pending)
            });
            if handle.time_out(callback.as_ref().map(|(callback, _)| callback.clone())) {
                token.cancel();
                debug!(job_id = %job_id, "Job timed out");
                if let Some((callback, pending)) = callback {
                    launch_timeout_callback(handle, scope, callback, pending);
                }
            }
        }
        Outcome::Finished(Ok(Ok(()))) => {
            if handle.finish(JobState::Completed) {
                debug!(job_id = %job_id, "Job completed");
            } else {
                debug!(
                    job_id = %job_id,
                    state = %handle.state(),
                    "Completion after cancellation ignored"
                );
            }
        }
        Outcome::Finished(Ok(Err(e))) => {
            debug!(job_id = %job_id, "Job body failed: {:#}", e);
            handle.fail(e);
        }
        Outcome::Finished(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            warn!(job_id = %job_id, "Job body panicked: {}", message);
            handle.fail(anyhow::anyhow!("job body panicked: {}", message));
        }
    }
}

fn launch_timeout_callback(
    handle: &JobHandle,
    scope: &Arc<ExecutionScope>,
    callback: JobHandle,
    pending: PendingCallback,
) {
    let PendingCallback { dispatcher, body } = pending;
    let callback_id = callback.id();
    match submit(scope, dispatcher, callback.clone(), body, None) {
        Ok(()) => {
            debug!(job_id = %handle.id(), callback_id = %callback_id, "Timeout callback launched");
        }
        Err(e) => {
            // Scope cancelled between the deadline and the launch
            callback.finish(JobState::Cancelled);
            debug!(
                job_id = %handle.id(),
                callback_id = %callback_id,
                "Timeout callback skipped: {}", e
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Blocking is only safe where the runtime can keep driving the job
fn ensure_can_block() -> Result<()> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
            Err(JobError::BlockingInRuntime)
        }
        _ => Ok(()),
    }
}

fn block_until_finished(handle: &JobHandle) -> JobState {
    if Handle::try_current().is_ok() {
        tokio::task::block_in_place(|| futures::executor::block_on(handle.wait()))
    } else {
        futures::executor::block_on(handle.wait())
    }
}
