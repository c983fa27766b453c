//! Domain types
//!
//! Core business entities shared by every jobkit component.

pub mod job;
pub mod policy;

pub use job::{BodyResult, JobId, JobState};
pub use policy::{Dispatcher, ExecutionPolicy, Task};
