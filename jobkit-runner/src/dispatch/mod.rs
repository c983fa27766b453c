//! Dispatch layer
//!
//! Maps execution policies onto the tokio runtime. Each built-in policy has
//! a [`Dispatcher`] implementation; custom policies bring their own.
//!
//! Tasks handed to a dispatcher need a tokio runtime context when they are
//! polled (deadlines use tokio timers). Custom dispatchers must poll them
//! from inside a runtime.

mod blocking;
mod inline;
mod pool;

pub use blocking::BlockingDispatcher;
pub use inline::InlineDispatcher;
pub use pool::PoolDispatcher;

use jobkit_core::domain::{Dispatcher, ExecutionPolicy};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Built-in dispatchers bound to one runtime
#[derive(Debug, Clone)]
pub struct Dispatchers {
    handle: Handle,
    pool: Arc<dyn Dispatcher>,
    io: Arc<dyn Dispatcher>,
    inline: Arc<dyn Dispatcher>,
}

impl Dispatchers {
    /// Creates the built-in dispatchers for a runtime
    pub fn new(handle: Handle) -> Self {
        Self {
            pool: Arc::new(PoolDispatcher::new(handle.clone())),
            io: Arc::new(BlockingDispatcher::new(handle.clone())),
            inline: Arc::new(InlineDispatcher::new(handle.clone())),
            handle,
        }
    }

    /// The runtime the dispatchers spawn onto
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Resolves a policy to the dispatcher that runs it
    pub fn resolve(&self, policy: &ExecutionPolicy) -> Arc<dyn Dispatcher> {
        match policy {
            ExecutionPolicy::Pool => Arc::clone(&self.pool),
            ExecutionPolicy::Io => Arc::clone(&self.io),
            ExecutionPolicy::Inline => Arc::clone(&self.inline),
            ExecutionPolicy::Custom(dispatcher) => Arc::clone(dispatcher),
        }
    }

    /// Like [`resolve`](Self::resolve), but never runs on the calling thread
    ///
    /// Used for work launched from inside another job, such as timeout
    /// callbacks, which must not re-enter the launching task.
    pub fn resolve_deferred(&self, policy: &ExecutionPolicy) -> Arc<dyn Dispatcher> {
        match policy {
            ExecutionPolicy::Inline => Arc::clone(&self.pool),
            other => self.resolve(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_builtin_policies() {
        let dispatchers = Dispatchers::new(Handle::current());

        assert_eq!(dispatchers.resolve(&ExecutionPolicy::Pool).name(), "pool");
        assert_eq!(dispatchers.resolve(&ExecutionPolicy::Io).name(), "io");
        assert_eq!(dispatchers.resolve(&ExecutionPolicy::Inline).name(), "inline");
    }

    #[tokio::test]
    async fn test_deferred_inline_uses_pool() {
        let dispatchers = Dispatchers::new(Handle::current());

        assert_eq!(
            dispatchers.resolve_deferred(&ExecutionPolicy::Inline).name(),
            "pool"
        );
        assert_eq!(dispatchers.resolve_deferred(&ExecutionPolicy::Io).name(), "io");
    }

    #[tokio::test]
    async fn test_custom_policy_resolves_to_itself() {
        let dispatchers = Dispatchers::new(Handle::current());
        let custom: Arc<dyn Dispatcher> =
            Arc::new(PoolDispatcher::named(Handle::current(), "reports"));

        let resolved = dispatchers.resolve(&ExecutionPolicy::Custom(Arc::clone(&custom)));
        assert!(Arc::ptr_eq(&resolved, &custom));
        assert_eq!(resolved.name(), "reports");
    }
}
