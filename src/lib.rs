//! Transformation job lifecycle engine.
//!
//! A [`registry::JobRegistry`] creates, runs, stops and deletes transformation
//! jobs, each a simulation process supervised in its own working directory.
//! Job state is derived lazily from the process exit status whenever it is
//! read.

pub mod api;
pub mod config;
pub mod error;
pub mod process;
pub mod registry;
pub mod state_machine;

pub use error::{JobError, Result};
pub use registry::{JobRef, JobRegistry};
pub use state_machine::{JobConfig, JobId, JobState};
