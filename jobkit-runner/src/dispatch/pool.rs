//! Worker pool dispatcher

use jobkit_core::domain::{Dispatcher, Task};
use tokio::runtime::Handle;

/// Spawns tasks onto the runtime's worker pool
#[derive(Debug, Clone)]
pub struct PoolDispatcher {
    handle: Handle,
    name: String,
}

impl PoolDispatcher {
    pub fn new(handle: Handle) -> Self {
        Self::named(handle, "pool")
    }

    /// A pool dispatcher reported under a custom name
    ///
    /// Handy for [`ExecutionPolicy::Custom`](jobkit_core::domain::ExecutionPolicy::Custom)
    /// policies that target a separate runtime.
    pub fn named(handle: Handle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
        }
    }
}

impl Dispatcher for PoolDispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, task: Task) {
        // Detached: the job handle, not the join handle, tracks the outcome
        drop(self.handle.spawn(task));
    }
}
