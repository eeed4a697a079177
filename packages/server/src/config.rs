//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

/// Default TCP port for the job centre.
pub const DEFAULT_PORT: u16 = 50001;

/// Longest request line accepted before it is rejected unread.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Server configuration, from flags or `JOB_CENTER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "job-center")]
#[command(about = "In-memory priority job queue server", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "JOB_CENTER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "JOB_CENTER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum request line length in bytes
    #[arg(long, env = "JOB_CENTER_MAX_LINE_BYTES", default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Loopback on an ephemeral port, for tests and local runs.
    pub fn local() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Default::default()
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the maximum request line length.
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
