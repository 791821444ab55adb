use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

/// Port that receives a `HEAD` request before reading, with the `Server:` header extracted.
pub const HTTP_PORT: u16 = 80;

const HTTP_HEAD_REQUEST: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";
const FIRST_READ_TIMEOUT: Duration = Duration::from_secs(1);
const FOLLOWUP_READ_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_BANNER_TIME: Duration = Duration::from_secs(3);
const MAX_BANNER_BYTES: usize = 4096;

/// Reads a service hint from a freshly opened connection.
///
/// Implementations must return within a bounded time and report any failure as an
/// empty string. The scanner owns the stream and closes it after this returns.
#[async_trait]
pub trait BannerGrabber: Send + Sync {
    async fn grab(&self, stream: &mut TcpStream, port: u16) -> String;
}

/// Default grabber backed by [`grab_banner`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceBanner;

#[async_trait]
impl BannerGrabber for ServiceBanner {
    async fn grab(&self, stream: &mut TcpStream, port: u16) -> String {
        grab_banner(stream, port).await
    }
}

/// Skips banner collection entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBanner;

#[async_trait]
impl BannerGrabber for NoBanner {
    async fn grab(&self, _stream: &mut TcpStream, _port: u16) -> String {
        String::new()
    }
}

/// Read whatever the service volunteers within a short window.
///
/// The first read waits up to one second; every chunk received extends the window by
/// 100ms so multi-packet greetings are captured. Collection stops at EOF, on any read
/// error, after 4 KiB or after three seconds overall.
pub async fn grab_banner<S>(stream: &mut S, port: u16) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if port == HTTP_PORT && stream.write_all(HTTP_HEAD_REQUEST).await.is_err() {
        return String::new();
    }

    let hard_deadline = Instant::now() + MAX_BANNER_TIME;
    let mut deadline = (Instant::now() + FIRST_READ_TIMEOUT).min(hard_deadline);
    let mut banner = Vec::new();
    let mut buf = [0u8; 1024];

    while banner.len() < MAX_BANNER_BYTES {
        match time::timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                banner.extend_from_slice(&buf[..n]);
                deadline = (Instant::now() + FOLLOWUP_READ_TIMEOUT).min(hard_deadline);
            }
            _ => break,
        }
    }
    banner.truncate(MAX_BANNER_BYTES);

    let text = String::from_utf8_lossy(&banner);
    let text = text.trim();
    if port == HTTP_PORT {
        if let Some(server) = server_header(text) {
            return server;
        }
    }
    text.to_string()
}

fn server_header(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("server")
            .then(|| value.trim().to_string())
    })
}
