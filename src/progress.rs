//! Progress reporting from the scan engine to an observer.
//!
//! The engine calls [`ProgressSink::on_port_processed`] exactly once per submitted port,
//! open or closed, and [`ProgressSink::finish`] exactly once after the last unit. Sinks
//! must return promptly: they run on worker tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

pub trait ProgressSink: Send + Sync {
    /// One port has been resolved.
    fn on_port_processed(&self);

    /// All units for the scan have been emitted.
    fn finish(&self) {}
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_port_processed(&self) {}
}

/// Counts processed ports; clones share the same counter so it can be polled mid-scan.
#[derive(Debug, Default, Clone)]
pub struct CountingProgress {
    done: Arc<AtomicU64>,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CountingProgress {
    fn on_port_processed(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forwards one `()` per processed port over an unbounded channel.
///
/// The sender is dropped on [`ProgressSink::finish`], so a receiver loop ends
/// deterministically once the scan has accounted for every port.
#[derive(Debug)]
pub struct ChannelProgress {
    tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl ProgressSink for ChannelProgress {
    fn on_port_processed(&self) {
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                // A dropped receiver just means nobody is watching.
                let _ = tx.send(());
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }
}

/// Terminal progress bar for one target.
#[derive(Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(target: &str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "[{prefix}] {elapsed_precise} {bar:30.cyan/blue} {pos:>5}/{len:5} {percent:>3}%",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉ ");
        bar.set_style(style);
        bar.set_prefix(target.to_string());
        Self { bar }
    }

    #[cfg(test)]
    fn hidden(total: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total);
        Self { bar }
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressSink for BarProgress {
    fn on_port_processed(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
