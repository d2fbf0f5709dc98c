//! # Internal Metrics Module
//!
//! Counters and gauges describing the relay's pipeline, exposed to
//! Prometheus when enabled.
//!
//! - **`MetricsBuilder`** installs the Prometheus recorder and binds the
//!   scrape listener.
//! - **`Metrics`** is the cloneable handle the pipeline stages record into.
//! - **`MetricsServer`** (in `server.rs`) serves `/metrics`.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

pub mod server;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub payloads_received_total: Counter,
    pub payloads_malformed_total: Counter,
    pub alerts_decoded_total: Counter,
    pub messages_delivered_total: Counter,
    pub messages_rejected_total: Counter,
    pub token_refreshes_total: Counter,
    pub ingestion_queue_depth: Gauge,
    enabled: bool,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Registers descriptions with the global recorder and creates handles.
    pub fn new() -> Self {
        metrics::describe_counter!("payloads_received_total", Unit::Count, "Webhook payloads accepted into the ingestion queue.");
        metrics::describe_counter!("payloads_malformed_total", Unit::Count, "Dequeued payloads discarded because they were not valid JSON.");
        metrics::describe_counter!("alerts_decoded_total", Unit::Count, "Alert events decoded from webhook payloads.");
        metrics::describe_counter!("messages_delivered_total", Unit::Count, "Messages accepted by WeCom.");
        metrics::describe_counter!("messages_rejected_total", Unit::Count, "Messages rejected by WeCom with a non-zero error code.");
        metrics::describe_counter!("token_refreshes_total", Unit::Count, "Successful access token refreshes.");
        metrics::describe_counter!("transport_retries_total", Unit::Count, "Outbound calls retried after a transport failure, labeled by endpoint.");
        metrics::describe_counter!("platform_retries_total", Unit::Count, "Outbound calls retried after a WeCom error code, labeled by endpoint.");
        metrics::describe_gauge!("ingestion_queue_depth", Unit::Count, "Payloads waiting in the ingestion queue.");

        Self {
            payloads_received_total: metrics::counter!("payloads_received_total"),
            payloads_malformed_total: metrics::counter!("payloads_malformed_total"),
            alerts_decoded_total: metrics::counter!("alerts_decoded_total"),
            messages_delivered_total: metrics::counter!("messages_delivered_total"),
            messages_rejected_total: metrics::counter!("messages_rejected_total"),
            token_refreshes_total: metrics::counter!("token_refreshes_total"),
            ingestion_queue_depth: metrics::gauge!("ingestion_queue_depth"),
            enabled: true,
        }
    }

    /// Creates a `Metrics` instance whose handles record nothing.
    pub fn disabled() -> Self {
        Self {
            payloads_received_total: Counter::noop(),
            payloads_malformed_total: Counter::noop(),
            alerts_decoded_total: Counter::noop(),
            messages_delivered_total: Counter::noop(),
            messages_rejected_total: Counter::noop(),
            token_refreshes_total: Counter::noop(),
            ingestion_queue_depth: Gauge::noop(),
            enabled: false,
        }
    }

    /// Counts one retry of an outbound call to `endpoint`.
    pub fn increment_transport_retry(&self, endpoint: &'static str) {
        if self.enabled {
            metrics::counter!("transport_retries_total", "endpoint" => endpoint).increment(1);
        }
    }

    /// Counts one retry of a call to `endpoint` that WeCom answered with an
    /// error code.
    pub fn increment_platform_retry(&self, endpoint: &'static str) {
        if self.enabled {
            metrics::counter!("platform_retries_total", "endpoint" => endpoint).increment(1);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and prepares the scrape server.
    ///
    /// Metrics are disabled rather than failing startup when the listener
    /// cannot be bound or the recorder cannot be installed.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::disabled(), None);
        }

        let listener = match TcpListener::bind(self.config.listen_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::disabled(), None);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::disabled(), None);
            }
        };

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);
        (metrics, Some((server, addr)))
    }
}
