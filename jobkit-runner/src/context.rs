//! Execution context for job bodies
//!
//! Every body and timeout callback receives a [`JobContext`]. The runner
//! drops a cancelled body at its next suspension point; bodies that do long
//! stretches of work without awaiting must poll the context themselves.

use jobkit_core::domain::JobId;
use tokio_util::sync::CancellationToken;

/// Context handed to a running job
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    token: CancellationToken,
}

impl JobContext {
    pub(crate) fn new(job_id: JobId, token: CancellationToken) -> Self {
        Self { job_id, token }
    }

    /// The job's identifier
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Whether cancellation (explicit, scope-wide or by timeout) was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Fails with an error once cancellation is requested
    ///
    /// Meant for loop iterations and the gaps between blocking calls:
    /// `ctx.checkpoint()?;`
    pub fn checkpoint(&self) -> anyhow::Result<()> {
        if self.is_cancelled() {
            anyhow::bail!("job {} was cancelled", self.job_id);
        }
        Ok(())
    }

    /// Token for work the body hands off to its own tasks
    ///
    /// The returned token is a child of the job's token; cancelling it does
    /// not cancel the job.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_checkpoint_fails_after_cancel() {
        let token = CancellationToken::new();
        let ctx = JobContext::new(Uuid::new_v4(), token.clone());

        assert!(ctx.checkpoint().is_ok());
        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(ctx.checkpoint().is_err());
    }

    #[test]
    fn test_child_token_does_not_cancel_job() {
        let token = CancellationToken::new();
        let ctx = JobContext::new(Uuid::new_v4(), token.clone());

        let child = ctx.child_token();
        child.cancel();
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.child_token().is_cancelled());
    }
}
