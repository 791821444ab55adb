use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use time::{format_description::well_known, macros::format_description, OffsetDateTime};

use crate::types::ScanResult;

pub const DEFAULT_OUTPUT_DIR: &str = "scan-results";

/// Everything written to a JSON results file for one run of the scanner.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanOutput {
    pub timestamp: String,
    pub targets: Vec<String>,
    pub total_ports: usize,
    pub results: Vec<ScanResult>,
}

impl ScanOutput {
    /// `targets` lists exactly the targets present in `results`, so targets skipped
    /// after a cancellation do not appear.
    pub fn new(total_ports: usize, results: Vec<ScanResult>) -> Self {
        Self {
            timestamp: now_rfc3339(),
            targets: results.iter().map(|r| r.target.clone()).collect(),
            total_ports,
            results,
        }
    }

    /// Write pretty JSON into `dir` (created if missing) as `DDMMYY-HHMMSS-cli-pscan.json`.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory: {}", dir.display()))?;

        let path = dir.join(results_file_name(OffsetDateTime::now_utc()));
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        Ok(path)
    }
}

fn results_file_name(at: OffsetDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[day][month][year repr:last_two]-[hour][minute][second]"
        ))
        .unwrap_or_else(|_| String::from("000000-000000"));
    format!("{stamp}-cli-pscan.json")
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
