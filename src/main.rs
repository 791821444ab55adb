use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pscan_rs::output::{ScanOutput, DEFAULT_OUTPUT_DIR};
use pscan_rs::progress::{BarProgress, NoProgress, ProgressSink};
use pscan_rs::scanner::{self, ScanContext};
use pscan_rs::types::{ScanConfig, DEFAULT_MAX_RETRIES, DEFAULT_WORKERS};
use pscan_rs::{ports, report, targets};

use anyhow::{bail, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// pscan-rs — concurrent TCP connect port scanner with retry/backoff and banner capture.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pscan-rs",
    version,
    about = "Concurrent TCP connect port scanner with retry/backoff and banner capture.",
    long_about = None
)]
struct Cli {
    /// The hostname or IP address to scan.
    #[arg(long)]
    target: Option<String>,

    /// Comma-separated list of targets (hostnames, IPs or CIDR blocks).
    #[arg(long)]
    targets: Option<String>,

    /// Lower bound of the port range.
    #[arg(long = "start-port", default_value_t = 1)]
    start_port: u16,

    /// Upper bound of the port range.
    #[arg(long = "end-port", default_value_t = 1024)]
    end_port: u16,

    /// Comma-separated ports and ranges (e.g. 22,80,8000-8010). Overrides the range.
    #[arg(long)]
    ports: Option<String>,

    /// File with one port or range per line. Overrides the range.
    #[arg(long = "ports-file", conflicts_with = "ports")]
    ports_file: Option<PathBuf>,

    /// Number of concurrent workers per target.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Connect timeout in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Connect attempts per port.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    retries: u32,

    /// Base backoff between attempts in milliseconds (doubles each retry).
    #[arg(long = "backoff-ms", default_value_t = 1000)]
    backoff_ms: u64,

    /// Write results as JSON into the output directory.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Directory for JSON results.
    #[arg(long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Disable the progress bar.
    #[arg(long = "no-progress", default_value_t = false)]
    no_progress: bool,

    /// Print effective flag values and enable debug logging.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if cli.debug {
        print_flags(&cli);
    }

    let target_list = targets::parse_targets(cli.target.as_deref(), cli.targets.as_deref())?;
    if target_list.is_empty() {
        bail!("no target specified; provide --target or --targets");
    }

    let port_list = if let Some(spec) = cli.ports.as_deref() {
        ports::parse_ports_str(spec)?
    } else if let Some(path) = cli.ports_file.as_deref() {
        ports::load_ports_from_path(path)?
    } else {
        ports::port_range(cli.start_port, cli.end_port)?
    };
    if port_list.is_empty() {
        bail!("no valid ports provided");
    }

    // Ctrl-C stops dispatching new ports; in-flight attempts finish within their timeouts.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let mut results = Vec::with_capacity(target_list.len());
    for target in &target_list {
        if cancel.is_cancelled() {
            warn!(host = %target, "skipping target after cancellation");
            continue;
        }
        print!("{}", report::format_header(target, &port_list));

        let cfg = ScanConfig::new(target.clone(), port_list.clone())
            .with_workers(cli.workers)
            .with_connect_timeout(Duration::from_secs(cli.timeout))
            .with_max_retries(cli.retries)
            .with_backoff_unit(Duration::from_millis(cli.backoff_ms));

        let progress: Arc<dyn ProgressSink> = if cli.no_progress {
            Arc::new(NoProgress)
        } else {
            Arc::new(BarProgress::new(target, port_list.len() as u64))
        };
        let ctx = ScanContext {
            progress,
            cancel: cancel.clone(),
            ..ScanContext::default()
        };

        let result = scanner::scan_target_with_context(&cfg, ctx).await?;
        print!("{}", report::format_summary(&result, &port_list));
        print!("{}", report::format_banners(&result));
        println!();
        results.push(result);
    }

    if cli.json {
        let output = ScanOutput::new(port_list.len(), results);
        let path = output.write_json(&cli.output_dir)?;
        println!("Scan results saved to {}", path.display());
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "pscan_rs=debug" } else { "pscan_rs=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_flags(cli: &Cli) {
    println!("pscan-rs configuration:");
    println!("  target       : {}", cli.target.as_deref().unwrap_or("<none>"));
    println!("  targets      : {}", cli.targets.as_deref().unwrap_or("<none>"));
    println!("  start-port   : {}", cli.start_port);
    println!("  end-port     : {}", cli.end_port);
    println!("  ports        : {}", cli.ports.as_deref().unwrap_or("<none>"));
    println!(
        "  ports-file   : {}",
        cli.ports_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("  workers      : {}", cli.workers);
    println!("  timeout      : {}s", cli.timeout);
    println!("  retries      : {}", cli.retries);
    println!("  backoff-ms   : {}", cli.backoff_ms);
    println!("  json         : {}", cli.json);
    println!("  output-dir   : {}", cli.output_dir.display());
    debug!(?cli, "parsed command line");
}
