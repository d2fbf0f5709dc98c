//! HTTP listener receiving Alertmanager webhook deliveries.
//!
//! The handler only enqueues the raw body; decoding and delivery happen in
//! the dispatcher. Any path is accepted.

use crate::internal_metrics::Metrics;
use crate::queue::QueueProducer;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::any,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Clone)]
struct WebhookState {
    producer: QueueProducer,
    metrics: Arc<Metrics>,
}

/// Builds the webhook router over `producer`.
///
/// Bodies are not size limited; a large alert group is still queued.
pub fn router(producer: QueueProducer, metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/", any(receive))
        .fallback(receive)
        .layer(DefaultBodyLimit::disable())
        .with_state(WebhookState { producer, metrics })
}

/// Enqueues the body, waiting while the queue is full.
async fn receive(State(state): State<WebhookState>, body: Bytes) -> StatusCode {
    let len = body.len();
    debug!(body = %String::from_utf8_lossy(&body), "Webhook body");

    match state.producer.enqueue(body).await {
        Ok(()) => {
            info!(bytes = len, "Received alert payload from Alertmanager");
            state.metrics.payloads_received_total.increment(1);
            StatusCode::OK
        }
        Err(e) => {
            error!(error = %e, "Dropping webhook payload received during shutdown");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Serves webhook deliveries until shutdown is signalled.
pub struct WebhookServer {
    listener: TcpListener,
    producer: QueueProducer,
    metrics: Arc<Metrics>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WebhookServer {
    pub fn new(
        listener: TcpListener,
        producer: QueueProducer,
        metrics: Arc<Metrics>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            producer,
            metrics,
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until shutdown, then closes the
    /// ingestion queue.
    pub fn run(self) -> impl Future<Output = ()> {
        let app = router(self.producer.clone(), self.metrics);
        let producer = self.producer;
        let listener = self.listener;
        let mut shutdown_rx = self.shutdown_rx;

        async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Webhook server error: {}", e);
            }
            producer.close();
            info!("Webhook server stopped; ingestion queue closed.");
        }
    }
}
