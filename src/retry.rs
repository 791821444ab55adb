use std::net::IpAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::banner::BannerGrabber;
use crate::connector;
use crate::types::{PortResult, ScanConfig};

/// How many times a port is tried and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ScanConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff_unit: cfg.backoff_unit,
        }
    }

    /// Delay after failed attempt `attempt` (zero-based): `backoff_unit * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_unit.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortOutcome {
    Open(PortResult),
    Closed(u16),
}

impl PortOutcome {
    pub fn port(&self) -> u16 {
        match self {
            PortOutcome::Open(r) => r.port,
            PortOutcome::Closed(p) => *p,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PortOutcome::Open(_))
    }
}

/// Resolve one port: connect with retries and exponential backoff, grab a banner on
/// the first success.
///
/// Exhausting the retry budget is a normal closed outcome. A cancellation observed
/// during backoff abandons the remaining attempts and also resolves closed.
pub async fn scan_port(
    ips: &[IpAddr],
    port: u16,
    connect_timeout: Duration,
    policy: RetryPolicy,
    banners: &dyn BannerGrabber,
    cancel: &CancellationToken,
) -> PortOutcome {
    for attempt in 0..policy.max_retries {
        match connector::connect_any(ips, port, connect_timeout).await {
            Ok(mut stream) => {
                let banner = banners.grab(&mut stream, port).await;
                drop(stream);
                debug!(port, attempt, "port open");
                return PortOutcome::Open(PortResult { port, banner });
            }
            Err(e) => {
                debug!(port, attempt, error = %e, "connect attempt failed");
                if attempt + 1 >= policy.max_retries {
                    break;
                }
                let delay = policy.backoff(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        debug!(port, "backoff interrupted by cancellation");
                        break;
                    }
                }
            }
        }
    }
    PortOutcome::Closed(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::{NoBanner, ServiceBanner};
    use std::net::SocketAddr;
    use std::time::Instant;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn policy(max_retries: u32, unit_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_unit: Duration::from_millis(unit_ms),
        }
    }

    async fn closed_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let p = policy(5, 1000);
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(8));
        assert_eq!(p.backoff(64), Duration::from_millis(1000).saturating_mul(u32::MAX));
    }

    #[tokio::test]
    async fn open_port_captures_banner_without_backoff() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let _ = sock.write_all(b"SSH-2.0-Test\r\n").await;
            }
        });

        let start = Instant::now();
        let outcome = scan_port(
            &[addr.ip()],
            addr.port(),
            Duration::from_secs(2),
            policy(3, 1000),
            &ServiceBanner,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(
            outcome,
            PortOutcome::Open(PortResult {
                port: addr.port(),
                banner: "SSH-2.0-Test".into()
            })
        );
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn closed_port_waits_for_cumulative_backoff() {
        let addr = closed_addr().await;
        let start = Instant::now();
        let outcome = scan_port(
            &[addr.ip()],
            addr.port(),
            Duration::from_secs(1),
            policy(3, 20),
            &NoBanner,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, PortOutcome::Closed(addr.port()));
        // 20ms + 40ms between three attempts, nothing after the last one.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn cancellation_cuts_backoff_short() {
        let addr = closed_addr().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = Instant::now();
        let outcome = scan_port(
            &[addr.ip()],
            addr.port(),
            Duration::from_secs(1),
            policy(3, 5_000),
            &NoBanner,
            &cancel,
        )
        .await;
        assert!(!outcome.is_open());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
