use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::error::{ConnectError, ScanError};

/// Resolve a hostname or IP literal to the addresses every connect attempt of a scan will try,
/// in resolver order with duplicates removed.
pub async fn resolve_target(target: &str) -> Result<Vec<IpAddr>, ScanError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ScanError::EmptyTarget);
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    let addrs = lookup_host((target, 0))
        .await
        .map_err(|source| ScanError::Resolve {
            target: target.to_string(),
            source,
        })?;

    let mut ips: Vec<IpAddr> = Vec::new();
    for addr in addrs {
        if !ips.contains(&addr.ip()) {
            ips.push(addr.ip());
        }
    }
    if ips.is_empty() {
        return Err(ScanError::Unresolved(target.to_string()));
    }
    debug!(host = target, ips = ?ips, "resolved target");
    Ok(ips)
}

/// A single TCP connect attempt bounded by `timeout`. Retrying is the caller's job.
pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, ConnectError> {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ConnectError::Io { addr, source }),
        Err(_) => Err(ConnectError::Timeout { addr, timeout }),
    }
}

/// One connect attempt against `port` that falls back across every resolved address.
///
/// The whole attempt is bounded by `timeout`; each remaining address gets an even share
/// of what is left. The last address's error is returned when none accept.
pub async fn connect_any(
    ips: &[IpAddr],
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, ConnectError> {
    let deadline = Instant::now() + timeout;
    let mut last_err = ConnectError::NoAddress { port };
    for (i, ip) in ips.iter().enumerate() {
        let left = (ips.len() - i) as u32;
        let budget = deadline.saturating_duration_since(Instant::now()) / left;
        match connect(SocketAddr::new(*ip, port), budget).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn resolves_ip_literals_without_dns() {
        let ips = resolve_target(" 127.0.0.1 ").await.unwrap();
        assert_eq!(ips, vec![IpAddr::from([127, 0, 0, 1])]);
    }

    #[tokio::test]
    async fn empty_target_rejected() {
        assert!(matches!(
            resolve_target("").await,
            Err(ScanError::EmptyTarget)
        ));
    }

    #[tokio::test]
    async fn connect_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = connect(addr, Duration::from_secs(2)).await;
        assert!(stream.is_ok());
    }

    #[tokio::test]
    async fn connect_refused_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = connect(addr, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ConnectError::Io { .. }));
    }

    #[tokio::test]
    async fn unknown_host_fails_to_resolve() {
        let err = resolve_target("no-such-host.invalid").await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Resolve { .. } | ScanError::Unresolved(_)
        ));
    }

    #[tokio::test]
    async fn connect_any_falls_back_past_dead_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Nothing listens on 127.0.0.2 for this port.
        let ips = [IpAddr::from([127, 0, 0, 2]), IpAddr::from([127, 0, 0, 1])];

        let stream = connect_any(&ips, port, Duration::from_secs(2)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), SocketAddr::new(ips[1], port));
    }

    #[tokio::test]
    async fn connect_any_reports_last_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_any(&[IpAddr::from([127, 0, 0, 1])], port, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Io { .. }));

        let err = connect_any(&[], port, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ConnectError::NoAddress { port: p } if p == port));
    }
}
