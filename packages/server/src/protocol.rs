//! Newline-delimited JSON request/response codec.

use queue_core::{JobId, Priority, SchedulerError};
use scheduler::Assignment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const REQUEST_TYPES: [&str; 4] = ["put", "get", "abort", "delete"];

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum Request {
    /// Submit a job.
    Put {
        queue: String,
        job: Value,
        pri: Priority,
    },
    /// Retrieve the best ready job from any of `queues`.
    Get {
        queues: Vec<String>,
        #[serde(default)]
        wait: bool,
    },
    /// Hand an assigned job back.
    Abort { id: JobId },
    /// Remove a job for good.
    Delete { id: JobId },
}

/// Reasons a request line is rejected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unmarshal error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing request type.")]
    MissingRequestType,

    #[error("Unrecognised request type.")]
    UnknownRequest(String),

    #[error("Request exceeds {limit} bytes.")]
    Oversized { limit: usize },
}

impl Request {
    /// Decode one request line.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(line)?;
        let kind = value
            .get("request")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingRequestType)?;
        if !REQUEST_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownRequest(kind.to_owned()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pri: Option<Priority>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queue: Option<String>,
    },
    NoJob,
    Error {
        error: String,
    },
}

impl Response {
    /// Plain success.
    pub fn ok() -> Self {
        Response::Ok {
            id: None,
            job: None,
            pri: None,
            queue: None,
        }
    }

    /// Reply to a put.
    pub fn created(id: JobId) -> Self {
        Response::Ok {
            id: Some(id),
            job: None,
            pri: None,
            queue: None,
        }
    }

    /// Reply to a successful get.
    pub fn assigned(assignment: Assignment) -> Self {
        Response::Ok {
            id: Some(assignment.job.id),
            job: Some(assignment.job.payload),
            pri: Some(assignment.job.priority),
            queue: Some(assignment.queue),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    /// Encode as a single line including the trailing newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl From<SchedulerError> for Response {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NoJob | SchedulerError::JobNotFound(_) => Response::NoJob,
            SchedulerError::NoQueues => Response::error(err.to_string()),
        }
    }
}

impl From<&ProtocolError> for Response {
    fn from(err: &ProtocolError) -> Self {
        Response::error(err.to_string())
    }
}
