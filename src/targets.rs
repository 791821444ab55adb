use anyhow::{bail, Result};
use ipnet::IpNet;
use std::collections::HashSet;

/// Largest CIDR block that is expanded into individual targets.
pub const MAX_CIDR_HOSTS: u64 = 65_536;

/// Merge `--target` and the comma-separated `--targets` into one ordered list.
///
/// Entries are trimmed, blanks dropped and duplicates removed (first occurrence wins).
/// CIDR blocks such as `192.168.1.0/30` expand to their host addresses.
pub fn parse_targets(target: Option<&str>, targets: Option<&str>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    let raw = target
        .into_iter()
        .chain(targets.into_iter().flat_map(|t| t.split(',')))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    for entry in raw {
        let expanded = match entry.parse::<IpNet>() {
            Ok(net) => expand_cidr(net)?,
            Err(_) => vec![entry.to_string()],
        };
        for t in expanded {
            if seen.insert(t.clone()) {
                out.push(t);
            }
        }
    }
    Ok(out)
}

/// Expand a CIDR block into host addresses.
///
/// For IPv4 prefixes shorter than /31 the network and broadcast addresses are excluded.
pub fn expand_cidr(net: IpNet) -> Result<Vec<String>> {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    if host_bits > 63 || (1u64 << host_bits) > MAX_CIDR_HOSTS {
        bail!("CIDR block {net} is too large to scan (limit {MAX_CIDR_HOSTS} addresses)");
    }
    Ok(net.hosts().map(|ip| ip.to_string()).collect())
}
