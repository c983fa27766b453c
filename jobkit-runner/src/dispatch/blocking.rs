//! Blocking pool dispatcher
//!
//! Runs each task on a thread of the runtime's blocking pool, driving it
//! with `Handle::block_on`. Suited to bodies that mostly sit in blocking
//! I/O calls and would otherwise starve the worker pool.

use jobkit_core::domain::{Dispatcher, Task};
use tokio::runtime::Handle;

/// Runs tasks on the runtime's blocking pool
#[derive(Debug, Clone)]
pub struct BlockingDispatcher {
    handle: Handle,
}

impl BlockingDispatcher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Dispatcher for BlockingDispatcher {
    fn name(&self) -> &str {
        "io"
    }

    fn dispatch(&self, task: Task) {
        let handle = self.handle.clone();
        drop(self.handle.spawn_blocking(move || handle.block_on(task)));
    }
}
