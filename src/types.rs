use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ScanError;

pub const DEFAULT_WORKERS: usize = 100;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Parameters for scanning one target. Immutable for the duration of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub target: String,
    /// Scan order; may contain duplicates.
    pub ports: Vec<u16>,
    pub workers: usize,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    /// Base delay for exponential backoff between connect attempts.
    pub backoff_unit: Duration,
}

impl ScanConfig {
    pub fn new(target: impl Into<String>, ports: Vec<u16>) -> Self {
        Self {
            target: target.into(),
            ports,
            workers: DEFAULT_WORKERS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Reject configurations that cannot produce a meaningful scan.
    ///
    /// Target resolution is checked separately by the scanner since it needs the runtime.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.target.trim().is_empty() {
            return Err(ScanError::EmptyTarget);
        }
        if self.ports.is_empty() {
            return Err(ScanError::NoPorts);
        }
        if self.ports.contains(&0) {
            return Err(ScanError::InvalidPort(0));
        }
        if self.workers < 1 {
            return Err(ScanError::NoWorkers);
        }
        if self.max_retries < 1 {
            return Err(ScanError::NoRetries);
        }
        Ok(())
    }
}

/// One open port and the banner captured from its connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub banner: String,
}

/// Final, sorted outcome of scanning one target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub target: String,
    pub open_ports: Vec<PortResult>,
    pub total_ports: usize,
    pub open_count: usize,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl ScanResult {
    /// Reduce collected open ports into the canonical result: sorted ascending by port,
    /// with `open_count` derived from the list.
    pub fn from_parts(
        target: impl Into<String>,
        total_ports: usize,
        mut open_ports: Vec<PortResult>,
        duration: Duration,
    ) -> Self {
        open_ports.sort_by_key(|p| p.port);
        Self {
            target: target.into(),
            open_count: open_ports.len(),
            open_ports,
            total_ports,
            duration,
            cancelled: false,
        }
    }

    pub fn open_port_numbers(&self) -> Vec<u16> {
        self.open_ports.iter().map(|p| p.port).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Durations as seconds with millisecond precision, e.g. `"0.456s"`.
mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{:.3}s", d.as_secs_f64()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        let secs: f64 = raw
            .trim_end_matches('s')
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid duration: {raw}")))?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(de::Error::custom(format!("invalid duration: {raw}")));
        }
        Ok(Duration::from_millis((secs * 1000.0).round() as u64))
    }
}
