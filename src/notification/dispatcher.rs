//! The dispatcher is the single consumer of the ingestion queue. It decodes
//! each payload and relays its alerts to WeCom one at a time, pausing between
//! sends to stay under the platform's rate limit.

use crate::core::{AlertEvent, SeverityRecipientMap};
use crate::decoder;
use crate::formatting::TextFormatter;
use crate::internal_metrics::Metrics;
use crate::notification::credentials::CredentialManager;
use crate::notification::delivery::{DeliveryClient, DeliveryOutcome};
use crate::notification::wecom::MessageTemplate;
use crate::queue::QueueConsumer;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Pause between two consecutive sends.
pub const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

/// The `Dispatcher` actor.
pub struct Dispatcher {
    consumer: QueueConsumer,
    recipients: SeverityRecipientMap,
    template: MessageTemplate,
    formatter: Box<dyn TextFormatter>,
    credentials: CredentialManager,
    delivery: DeliveryClient,
    rate_limit: Duration,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        consumer: QueueConsumer,
        recipients: SeverityRecipientMap,
        template: MessageTemplate,
        formatter: Box<dyn TextFormatter>,
        credentials: CredentialManager,
        delivery: DeliveryClient,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            consumer,
            recipients,
            template,
            formatter,
            credentials,
            delivery,
            rate_limit: RATE_LIMIT_INTERVAL,
            metrics,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Runs the dispatcher's main loop until shutdown is signalled or the
    /// queue is closed and drained.
    ///
    /// A payload already being processed is finished before the signal is
    /// observed.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Dispatcher started.");
        loop {
            let payload = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Dispatcher received shutdown signal.");
                    break;
                }
                payload = self.consumer.dequeue() => payload,
            };

            match payload {
                Some(payload) => {
                    self.metrics
                        .ingestion_queue_depth
                        .set(self.consumer.len() as f64);
                    self.process_payload(&payload).await;
                }
                None => {
                    info!("Ingestion queue closed. Shutting down dispatcher.");
                    break;
                }
            }
        }

        let abandoned = self.consumer.len();
        if abandoned > 0 {
            warn!(abandoned, "Dispatcher stopped with payloads still queued.");
        }
        info!("Dispatcher finished.");
    }

    /// Relays every alert in one raw payload and returns how many alerts were
    /// handed to the delivery client.
    ///
    /// A payload that is not JSON is logged and discarded.
    pub async fn process_payload(&mut self, payload: &[u8]) -> usize {
        let events = match decoder::decode(payload) {
            Ok(events) => events,
            Err(e) => {
                error!(
                    error = %e,
                    body = %String::from_utf8_lossy(payload),
                    "Discarding malformed webhook payload"
                );
                self.metrics.payloads_malformed_total.increment(1);
                return 0;
            }
        };

        debug!("Decoded {} alerts from payload", events.len());
        self.metrics.alerts_decoded_total.increment(events.len() as u64);

        for event in &events {
            self.dispatch_event(event).await;
            sleep(self.rate_limit).await;
        }
        events.len()
    }

    async fn dispatch_event(&mut self, event: &AlertEvent) -> DeliveryOutcome {
        let recipient = self.recipients.resolve(&event.level);
        if recipient.is_empty() {
            warn!(
                level = %event.level,
                alert = %event.alert_name,
                "No recipient configured for alert level, sending anyway"
            );
        }

        let content = self
            .formatter
            .format_alert(event, Local::now().naive_local());
        let message = self.template.text(recipient, content);

        let token = self.credentials.ensure_valid().await;
        self.delivery.send(&token, &message).await
    }
}
