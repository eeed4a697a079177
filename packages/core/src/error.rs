//! Error type shared by the scheduler and its callers.

use thiserror::Error;

use crate::JobId;

/// Negative outcomes of scheduler operations.
///
/// None of these are fatal: they are reported to the caller that issued the
/// request and leave shared state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// No ready job in any of the requested queues.
    #[error("no job available")]
    NoJob,

    /// The id is unknown, already deleted, or not held by the caller.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// A get request named no queues.
    #[error("no queues given")]
    NoQueues,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
