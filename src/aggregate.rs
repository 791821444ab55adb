use std::time::Instant;

use tokio::sync::Mutex;

use crate::retry::PortOutcome;
use crate::types::{PortResult, ScanResult};

/// Collects per-port outcomes from concurrent workers into one [`ScanResult`].
///
/// The clock starts at construction, which the scanner does right before
/// dispatching the first port.
#[derive(Debug)]
pub struct ResultAggregator {
    target: String,
    total_ports: usize,
    started: Instant,
    open: Mutex<Vec<PortResult>>,
}

impl ResultAggregator {
    pub fn new(target: impl Into<String>, total_ports: usize) -> Self {
        Self {
            target: target.into(),
            total_ports,
            started: Instant::now(),
            open: Mutex::new(Vec::new()),
        }
    }

    pub async fn record(&self, outcome: PortOutcome) {
        if let PortOutcome::Open(result) = outcome {
            self.open.lock().await.push(result);
        }
    }

    /// Sort what was collected and stamp the elapsed time.
    pub async fn finish(&self) -> ScanResult {
        let open = std::mem::take(&mut *self.open.lock().await);
        ScanResult::from_parts(
            self.target.clone(),
            self.total_ports,
            open,
            self.started.elapsed(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn open(port: u16) -> PortOutcome {
        PortOutcome::Open(PortResult {
            port,
            banner: format!("svc-{port}"),
        })
    }

    #[tokio::test]
    async fn concurrent_records_are_sorted() {
        let agg = Arc::new(ResultAggregator::new("host", 6));
        let mut set = tokio::task::JoinSet::new();
        for port in [443u16, 22, 8080, 80, 21, 25] {
            let agg = agg.clone();
            set.spawn(async move {
                let outcome = if port % 2 == 0 {
                    open(port)
                } else {
                    PortOutcome::Closed(port)
                };
                agg.record(outcome).await;
            });
        }
        while set.join_next().await.is_some() {}

        let result = agg.finish().await;
        assert_eq!(result.total_ports, 6);
        // Odd ports were recorded closed.
        assert_eq!(result.open_port_numbers(), vec![22, 80, 8080]);
        assert_eq!(result.open_count, 3);
        // Banners stay attached to the port they came from.
        assert!(result
            .open_ports
            .iter()
            .all(|p| p.banner == format!("svc-{}", p.port)));
    }

    proptest! {
        #[test]
        fn from_parts_sorts_and_counts(ports in proptest::collection::hash_set(1u16.., 0..200)) {
            let open: Vec<PortResult> = ports
                .iter()
                .map(|&port| PortResult { port, banner: String::new() })
                .collect();
            let result = ScanResult::from_parts("t", 500, open, Duration::ZERO);

            prop_assert_eq!(result.open_count, result.open_ports.len());
            prop_assert_eq!(result.open_count, ports.len());
            prop_assert!(result.open_ports.windows(2).all(|w| w[0].port < w[1].port));
        }
    }
}
