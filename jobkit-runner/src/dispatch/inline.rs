//! Inline dispatcher
//!
//! Polls the task once on the launching thread. If it completes, nothing is
//! spawned; otherwise the rest of the task continues on the worker pool.
//! Launch returns only after the body reaches its first suspension point.

use jobkit_core::domain::{Dispatcher, Task};
use std::task::{Context, Poll, Waker};
use tokio::runtime::Handle;

/// Starts tasks on the caller's thread
#[derive(Debug, Clone)]
pub struct InlineDispatcher {
    handle: Handle,
}

impl InlineDispatcher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Dispatcher for InlineDispatcher {
    fn name(&self) -> &str {
        "inline"
    }

    fn dispatch(&self, mut task: Task) {
        // Timers and cancellation futures register with the runtime on first poll
        let _guard = self.handle.enter();

        // The spawned task polls again with a real waker
        let mut cx = Context::from_waker(Waker::noop());
        if let Poll::Pending = task.as_mut().poll(&mut cx) {
            drop(self.handle.spawn(task));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_ready_task_runs_before_dispatch_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = InlineDispatcher::new(Handle::current());

        let c = Arc::clone(&counter);
        dispatcher.dispatch(
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_task_continues_on_pool() {
        let counter = Arc::new(AtomicUsize::new(0));
        let dispatcher = InlineDispatcher::new(Handle::current());

        let c = Arc::clone(&counter);
        dispatcher.dispatch(
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
