//! Concurrent priority job scheduler.
//!
//! [`JobScheduler`] is the single owner of all queues. Connections call
//! into it to submit, retrieve, abort and delete jobs; a connection that
//! goes away hands its jobs back through [`JobScheduler::disconnect`].
//!
//! # Usage
//!
//! ```ignore
//! use scheduler::JobScheduler;
//! use queue_core::{ClientId, Priority};
//!
//! let scheduler = JobScheduler::new();
//! let id = scheduler.put("build", serde_json::json!({"ref": "main"}), Priority(10)).await;
//! let assignment = scheduler.get(&["build"], true, ClientId(1)).await?;
//! scheduler.delete(assignment.job.id).await?;
//! ```

mod scheduler;
mod state;

pub use scheduler::JobScheduler;
pub use state::{Assignment, SchedulerStats};
