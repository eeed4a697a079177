//! Core domain types for the job queue system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobId, Priority and JobState for work items
//! - ClientId for connection ownership
//! - PriorityQueue, the per-queue heap
//! - SchedulerError for negative results

mod error;
mod job;
mod queue;

pub use error::{SchedulerError, SchedulerResult};
pub use job::{ClientId, Job, JobId, JobState, Priority};
pub use queue::{PriorityQueue, QueueStats};
