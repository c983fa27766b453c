//! Data transfer objects
//!
//! Serializable views of runtime state, used for reporting.

pub mod job;

pub use job::JobSnapshot;
