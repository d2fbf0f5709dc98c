use crate::internal_metrics::Metrics;
use crate::queue::QueueProducer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::debug;

/// Periodically records the ingestion queue depth and logs a heartbeat.
///
/// A heartbeat that keeps appearing after shutdown was signalled points at
/// a task that is not honouring the signal.
pub async fn run_queue_monitor(
    producer: QueueProducer,
    metrics: Arc<Metrics>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut timer = interval(period);
    let capacity = producer.capacity();
    debug!("[Heartbeat] 'QueueMonitor' started.");
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("[Heartbeat] 'QueueMonitor' received shutdown. Exiting.");
                break;
            }
            _ = timer.tick() => {
                let depth = producer.len();
                metrics.ingestion_queue_depth.set(depth as f64);
                debug!("[Heartbeat] 'QueueMonitor' is alive. {}/{} payloads queued.", depth, capacity);
            }
        }
    }
}
