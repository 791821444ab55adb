use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Configuration-level failures. These abort a scan before any worker is launched.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no target specified")]
    EmptyTarget,

    #[error("no ports to scan")]
    NoPorts,

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("max retries must be at least 1")]
    NoRetries,

    #[error("failed to resolve target {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("target {0} did not resolve to any address")]
    Unresolved(String),
}

/// Outcome of one failed connect attempt. Never escalated past the retry loop.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[error("connect to {addr} failed: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("no address to connect to for port {port}")]
    NoAddress { port: u16 },
}
