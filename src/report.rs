//! Human-readable scan report blocks. Everything is returned as a `String` so the
//! binary decides where it goes.

use std::fmt::Write as _;

use crate::types::ScanResult;

const RULE: &str = "====================================================";
const BOX_WIDTH: usize = 52;

pub fn format_header(target: &str, ports: &[u16]) -> String {
    format!(
        "{RULE}\n{:^width$}\n{RULE}\nScanning ports: {}\n",
        format!("SCAN START: {target}"),
        format_ports(ports),
        width = RULE.len()
    )
}

pub fn format_summary(result: &ScanResult, ports: &[u16]) -> String {
    let open = result
        .open_ports
        .iter()
        .map(|p| p.port.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let open = if open.is_empty() { "none".to_string() } else { open };

    let mut out = boxed_title("SCAN SUMMARY");
    for (label, value) in [
        ("Target", result.target.clone()),
        ("Ports Scanned", format_ports(ports)),
        ("Open Ports", open),
        ("Time Taken", format!("{:.3}s", result.duration.as_secs_f64())),
    ] {
        let _ = writeln!(
            out,
            "│ {label:<15} : {:<w$}│",
            fit(&value, BOX_WIDTH - 19),
            w = BOX_WIDTH - 19
        );
    }
    if result.cancelled {
        let _ = writeln!(
            out,
            "│ {:<w$}│",
            "(scan cancelled before completion)",
            w = BOX_WIDTH - 1
        );
    }
    out.push_str(&boxed_bottom());
    out
}

pub fn format_banners(result: &ScanResult) -> String {
    let mut out = boxed_title("BANNERS");
    for p in &result.open_ports {
        let banner = if p.banner.is_empty() {
            "<no banner>".to_string()
        } else {
            p.banner.replace('\n', "\\n").replace('\r', "\\r")
        };
        let _ = writeln!(
            out,
            "│ Port {:<6}: {:<w$}│",
            p.port,
            fit(&banner, BOX_WIDTH - 14),
            w = BOX_WIDTH - 14
        );
    }
    out.push_str(&boxed_bottom());
    out
}

/// Render ports compactly, collapsing consecutive runs: `[1,2,3,80]` -> `1-3, 80`.
pub fn format_ports(ports: &[u16]) -> String {
    let mut parts = Vec::new();
    let mut iter = ports.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if end.checked_add(1) == Some(next) {
                end = next;
                iter.next();
            } else {
                break;
            }
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(", ")
}

fn boxed_title(title: &str) -> String {
    let bar = "─".repeat(BOX_WIDTH);
    format!("┌{bar}┐\n│{title:^w$}│\n├{bar}┤\n", w = BOX_WIDTH)
}

fn boxed_bottom() -> String {
    format!("└{}┘\n", "─".repeat(BOX_WIDTH))
}

/// Truncate to `width` characters, marking the cut with `...`.
fn fit(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortResult;
    use std::time::Duration;

    fn sample() -> ScanResult {
        ScanResult::from_parts(
            "example.com",
            10,
            vec![
                PortResult {
                    port: 80,
                    banner: "nginx".into(),
                },
                PortResult {
                    port: 22,
                    banner: String::new(),
                },
            ],
            Duration::from_millis(250),
        )
    }

    #[test]
    fn ports_collapse_runs() {
        assert_eq!(format_ports(&[1, 2, 3, 80, 443, 444]), "1-3, 80, 443-444");
        assert_eq!(format_ports(&[65534, 65535]), "65534-65535");
        assert_eq!(format_ports(&[22, 22]), "22, 22");
        assert_eq!(format_ports(&[]), "");
    }

    #[test]
    fn summary_lists_open_ports_and_time() {
        let ports: Vec<u16> = (1..=1024).collect();
        let s = format_summary(&sample(), &ports);
        assert!(s.contains("SCAN SUMMARY"));
        assert!(s.contains("example.com"));
        assert!(s.contains("1-1024"));
        assert!(s.contains("22, 80"));
        assert!(s.contains("0.250s"));
        assert!(!s.contains("cancelled"));
    }

    #[test]
    fn banners_mark_missing() {
        let s = format_banners(&sample());
        assert!(s.contains("<no banner>"));
        assert!(s.contains("nginx"));
    }

    #[test]
    fn header_names_target() {
        let s = format_header("localhost", &[22, 80]);
        assert!(s.contains("SCAN START: localhost"));
        assert!(s.contains("Scanning ports: 22, 80"));
    }

    #[test]
    fn fit_truncates_long_values() {
        assert_eq!(fit("abcdef", 5), "ab...");
        assert_eq!(fit("abc", 5), "abc");
    }
}
