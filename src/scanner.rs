use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregate::ResultAggregator;
use crate::banner::{BannerGrabber, ServiceBanner};
use crate::connector;
use crate::error::ScanError;
use crate::retry::{self, RetryPolicy};
use crate::progress::{NoProgress, ProgressSink};
use crate::types::{ScanConfig, ScanResult};

/// Collaborators for one scan invocation.
#[derive(Clone)]
pub struct ScanContext {
    pub progress: Arc<dyn ProgressSink>,
    pub banners: Arc<dyn BannerGrabber>,
    pub cancel: CancellationToken,
}

impl Default for ScanContext {
    fn default() -> Self {
        Self {
            progress: Arc::new(NoProgress),
            banners: Arc::new(ServiceBanner),
            cancel: CancellationToken::new(),
        }
    }
}

/// Scan one target with the default banner grabber and no progress reporting.
pub async fn scan_target(config: &ScanConfig) -> Result<ScanResult, ScanError> {
    scan_target_with_context(config, ScanContext::default()).await
}

/// Variant that reports one unit per processed port to `progress`.
pub async fn scan_target_with_progress(
    config: &ScanConfig,
    progress: Arc<dyn ProgressSink>,
) -> Result<ScanResult, ScanError> {
    let ctx = ScanContext {
        progress,
        ..ScanContext::default()
    };
    scan_target_with_context(config, ctx).await
}

/// Scan the configured ports of one target using a fixed pool of `config.workers` tasks.
///
/// - Configuration and target resolution errors are returned before any worker starts.
/// - Workers drain a shared queue; each port is retried with exponential backoff.
/// - Every port yields exactly one progress unit, including ports left unclaimed when
///   the scan is cancelled.
/// - Open ports come back sorted ascending.
pub async fn scan_target_with_context(
    config: &ScanConfig,
    ctx: ScanContext,
) -> Result<ScanResult, ScanError> {
    config.validate()?;
    let ips: Arc<[IpAddr]> = connector::resolve_target(&config.target).await?.into();

    info!(
        host = %config.target,
        ips = ?ips,
        ports = config.ports.len(),
        workers = config.workers,
        "scan starting"
    );

    let queue = Arc::new(Mutex::new(config.ports.iter().copied().collect::<VecDeque<u16>>()));
    let aggregator = Arc::new(ResultAggregator::new(config.target.clone(), config.ports.len()));
    let policy = RetryPolicy::from_config(config);
    let connect_timeout = config.connect_timeout;
    // Ports taken off the queue vs. ports whose progress unit was emitted. They only
    // differ when a worker dies mid-attempt.
    let claimed = Arc::new(AtomicUsize::new(0));
    let reported = Arc::new(AtomicUsize::new(0));

    let mut set = JoinSet::new();
    for _ in 0..config.workers {
        let queue = queue.clone();
        let aggregator = aggregator.clone();
        let progress = ctx.progress.clone();
        let banners = ctx.banners.clone();
        let cancel = ctx.cancel.clone();
        let ips = ips.clone();
        let claimed = claimed.clone();
        let reported = reported.clone();

        set.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                // Release the queue lock before connecting.
                let next = queue.lock().await.pop_front();
                let Some(port) = next else {
                    break;
                };
                claimed.fetch_add(1, Ordering::Relaxed);

                let outcome = retry::scan_port(
                    &ips,
                    port,
                    connect_timeout,
                    policy,
                    banners.as_ref(),
                    &cancel,
                )
                .await;
                aggregator.record(outcome).await;
                progress.on_port_processed();
                reported.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "scan worker terminated abnormally");
        }
    }

    // Ports lost with a failed worker resolve closed but still count toward the total.
    let lost = claimed
        .load(Ordering::Relaxed)
        .saturating_sub(reported.load(Ordering::Relaxed));
    if lost > 0 {
        warn!(host = %config.target, lost, "ports lost to failed workers counted as closed");
    }

    // Anything still queued was never tried; account for it so observers reach the total.
    let unclaimed = std::mem::take(&mut *queue.lock().await);
    for _ in 0..lost + unclaimed.len() {
        ctx.progress.on_port_processed();
    }
    ctx.progress.finish();

    let mut result = aggregator.finish().await;
    if ctx.cancel.is_cancelled() {
        result.cancelled = true;
        warn!(
            host = %config.target,
            unclaimed = unclaimed.len(),
            "scan cancelled"
        );
    }

    info!(
        host = %result.target,
        open = result.open_count,
        total = result.total_ports,
        elapsed_ms = result.duration.as_millis() as u64,
        "scan finished"
    );
    Ok(result)
}
