//! Job domain types for work items in the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a job, allocated from a monotonically increasing counter.
///
/// The default value `0` is never handed out; it marks "no job yet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// The id that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority of a job. Higher values are served first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(pub u64);

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of the connection issuing requests.
///
/// Ownership of assigned jobs is tracked against this handle, so it must be
/// unique for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Availability of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Eligible for assignment.
    #[default]
    Ready,
    /// Held by exactly one connection.
    Assigned { owner: ClientId },
}

impl JobState {
    pub fn is_ready(&self) -> bool {
        matches!(self, JobState::Ready)
    }

    /// The owning connection, if the job is assigned.
    pub fn owner(&self) -> Option<ClientId> {
        match self {
            JobState::Ready => None,
            JobState::Assigned { owner } => Some(*owner),
        }
    }
}

/// A job represents a unit of work submitted to a named queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Globally unique identifier, never reused.
    pub id: JobId,
    /// The queue this job was submitted to.
    pub queue: String,
    /// Opaque payload supplied by the submitter.
    pub payload: serde_json::Value,
    /// Scheduling priority.
    pub priority: Priority,
    /// Current availability.
    pub state: JobState,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new ready job.
    pub fn new(
        id: JobId,
        queue: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            queue: queue.into(),
            payload,
            priority,
            state: JobState::Ready,
            created_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Whether `client` currently holds this job.
    pub fn is_owned_by(&self, client: ClientId) -> bool {
        self.state.owner() == Some(client)
    }

    /// Hand the job to `owner`.
    pub fn assign(&mut self, owner: ClientId) {
        self.state = JobState::Assigned { owner };
    }

    /// Return the job to the ready pool.
    pub fn release(&mut self) {
        self.state = JobState::Ready;
    }
}
