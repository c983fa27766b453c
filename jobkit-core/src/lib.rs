//! jobkit Core
//!
//! Core types and abstractions for the jobkit job runner.
//!
//! This crate contains:
//! - Domain types: job state, execution policy and the dispatcher seam
//! - DTOs: serializable snapshots of launched jobs
//! - Errors shared by the runner and its callers

pub mod domain;
pub mod dto;
pub mod error;

pub use error::{JobError, Result};
