//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    formatting::WeComTextFormatter,
    internal_metrics::{Metrics, MetricsBuilder},
    notification::{
        credentials::CredentialManager,
        delivery::DeliveryClient,
        dispatcher::Dispatcher,
        wecom::{HttpWeComApi, WeComApi},
    },
    queue::IngestionQueue,
    task_manager::TaskManager,
    utils::queue_monitor::run_queue_monitor,
    webhook::WebhookServer,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// How long shutdown waits for tasks before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

const QUEUE_MONITOR_PERIOD: Duration = Duration::from_secs(30);

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    listen_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
    shutdown_grace: Duration,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the webhook listener is bound to.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown(self.shutdown_grace).await;
        Ok(())
    }
}

/// Builder for the main application.
///
/// Components can be overridden for testing.
pub struct AppBuilder {
    config: Config,
    api_override: Option<Arc<dyn WeComApi>>,
    metrics_override: Option<Metrics>,
    shutdown_grace: Duration,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            api_override: None,
            metrics_override: None,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    /// Overrides the WeCom API client for testing.
    pub fn api_override(mut self, api: Arc<dyn WeComApi>) -> Self {
        self.api_override = Some(api);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Builds and starts all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // Bind first so a taken port fails startup before any task is spawned.
        let listener = TcpListener::bind(config.server.listen_address)
            .await
            .with_context(|| {
                format!(
                    "failed to bind webhook listener to {}",
                    config.server.listen_address
                )
            })?;
        let listen_addr = listener.local_addr()?;

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let (metrics, metrics_server) = match self.metrics_override {
            Some(m) => (m, None),
            None => {
                MetricsBuilder::new(config.metrics.clone())
                    .build(task_manager.get_shutdown_rx())
                    .await
            }
        };
        let metrics = Arc::new(metrics);
        let metrics_addr = match metrics_server {
            Some((server, addr)) => {
                task_manager.spawn("MetricsServer", server.run());
                info!("Serving metrics on http://{}/metrics", addr);
                Some(addr)
            }
            None => None,
        };

        // =========================================================================
        // 2. WeCom client, credentials and delivery
        // =========================================================================
        let api: Arc<dyn WeComApi> = match self.api_override {
            Some(api) => api,
            None => Arc::new(HttpWeComApi::new(
                &config.wechat.api_base_url,
                config.wechat.request_timeout(),
            )?),
        };
        let credentials = CredentialManager::new(
            api.clone(),
            config.wechat.corp_id.clone(),
            config.wechat.corp_secret.clone(),
            metrics.clone(),
        )
        .with_ttl(config.dispatch.token_ttl())
        .with_backoff(config.dispatch.retry_backoff());
        let delivery = DeliveryClient::new(api, metrics.clone())
            .with_backoff(config.dispatch.retry_backoff());

        // =========================================================================
        // 3. Ingestion queue and dispatcher
        // =========================================================================
        let (producer, consumer) = IngestionQueue::bounded(config.queue.capacity);
        let dispatcher = Dispatcher::new(
            consumer,
            config.levels.clone(),
            config.wechat.message_template(),
            Box::new(WeComTextFormatter),
            credentials,
            delivery,
            metrics.clone(),
        )
        .with_rate_limit(config.dispatch.rate_limit());
        task_manager.spawn("Dispatcher", dispatcher.run(task_manager.get_shutdown_rx()));

        task_manager.spawn(
            "QueueMonitor",
            run_queue_monitor(
                producer.clone(),
                metrics.clone(),
                QUEUE_MONITOR_PERIOD,
                task_manager.get_shutdown_rx(),
            ),
        );

        // =========================================================================
        // 4. Webhook listener
        // =========================================================================
        let server = WebhookServer::new(
            listener,
            producer,
            metrics,
            task_manager.get_shutdown_rx(),
        );
        task_manager.spawn("WebhookServer", server.run());
        info!("Listening for Alertmanager webhooks on {}", listen_addr);

        Ok(App {
            task_manager,
            listen_addr,
            metrics_addr,
            shutdown_grace: self.shutdown_grace,
        })
    }
}
