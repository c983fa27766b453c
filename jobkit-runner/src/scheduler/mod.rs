//! Scheduler layer for the runner
//!
//! This layer owns job lifecycles: launching bodies through a dispatcher,
//! racing them against cancellation and deadlines, and tracking every
//! active job in the runner's scope.

mod handle;
mod runner;
mod scope;

pub use handle::JobHandle;
pub use runner::JobRunner;
pub use scope::ExecutionScope;
