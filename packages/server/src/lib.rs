//! Line-oriented TCP front end for the job scheduler.
//!
//! Each connection sends one JSON request per line and gets one JSON
//! response per line back:
//!
//! ```text
//! --> {"request":"put","queue":"queue1","job":{"title":"example"},"pri":123}
//! <-- {"status":"ok","id":1}
//! --> {"request":"get","queues":["queue1"],"wait":true}
//! <-- {"status":"ok","id":1,"job":{"title":"example"},"pri":123,"queue":"queue1"}
//! --> {"request":"delete","id":1}
//! <-- {"status":"ok"}
//! ```
//!
//! Jobs still held by a connection when it closes go back to their queues.

mod config;
mod listener;
pub mod protocol;
mod session;
pub mod shutdown;

use std::net::SocketAddr;

use thiserror::Error;

pub use config::{DEFAULT_MAX_LINE_BYTES, DEFAULT_PORT, ServerConfig};
pub use listener::{bind, serve};
pub use protocol::{ProtocolError, Request, Response};
pub use session::Session;

/// Connection and listener failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
