//! Library crate for pscan-rs: a concurrent TCP connect scanner with per-port
//! retry/backoff, banner capture and progress reporting.
pub mod aggregate;
pub mod banner;
pub mod connector;
pub mod error;
pub mod output;
pub mod ports;
pub mod progress;
pub mod report;
pub mod retry;
pub mod scanner;
pub mod targets;
pub mod types;

pub use error::{ConnectError, ScanError};
pub use scanner::{scan_target, scan_target_with_context, scan_target_with_progress, ScanContext};
pub use types::{PortResult, ScanConfig, ScanResult};
