use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Parse a port list into TCP ports (1..=65535), preserving order and duplicates.
///
/// Entries are separated by commas and/or newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
/// - whitespace and blank entries are ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for entry in line.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if let Some((a, b)) = entry.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                out.extend(port_range(start, end)?);
                continue;
            }

            let p = parse_port_str(entry)
                .with_context(|| format!("line {line_no}: invalid port value: {entry}"))?;
            out.push(p);
        }
    }

    Ok(out)
}

/// Inclusive range of ports, as used for `--start-port`/`--end-port`.
pub fn port_range(start: u16, end: u16) -> Result<Vec<u16>> {
    if start == 0 {
        bail!("port out of range: 0");
    }
    if start > end {
        bail!("invalid range {start}-{end} (start > end)");
    }
    Ok((start..=end).collect())
}

/// Load a port list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
