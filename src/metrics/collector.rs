use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use super::{Aggregator, Sample};

/// Samples a lane may have in flight to the collector before it waits.
pub const SAMPLE_CHANNEL_CAPACITY: usize = 4096;

/// Runs the single accumulation point of a run. The task drains `samples_rx`
/// until every lane has dropped its sender, then hands the aggregator back
/// for finalization. `capture_wanted` is cleared once a successful response
/// has been kept, so lanes stop buffering bodies.
#[must_use]
pub fn setup_metrics_collector(
    mut aggregator: Aggregator,
    mut samples_rx: mpsc::Receiver<Sample>,
    capture_wanted: Arc<AtomicBool>,
) -> JoinHandle<Aggregator> {
    tokio::spawn(async move {
        capture_wanted.store(aggregator.wants_response(), Ordering::Relaxed);
        while let Some(sample) = samples_rx.recv().await {
            aggregator.fold(sample);
            if !aggregator.wants_response() {
                capture_wanted.store(false, Ordering::Relaxed);
            }
        }
        debug!(
            "Metrics collector drained after {} requests",
            aggregator.requests()
        );
        aggregator
    })
}
