//! wecom-alert - Alertmanager to WeCom relay
//!
//! Receives Alertmanager webhooks and forwards each alert as a WeCom
//! application text message.

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wecom_alert::{app::App, cli::Cli, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            // Logging is configured from the config; fall back to defaults here.
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("wecom-alert starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    info!("Queue Capacity: {}", config.queue.capacity);
    info!("WeCom API: {}", config.wechat.api_base_url);
    info!("Corp ID: {}", config.wechat.corp_id);
    info!("Agent ID: {}", config.wechat.agent_id);
    info!("Severity Levels Routed: {}", config.levels.len());
    info!("Rate Limit: {}ms", config.dispatch.rate_limit_ms);
    info!("Retry Backoff: {}s", config.dispatch.retry_backoff_seconds);
    match config.wechat.request_timeout_seconds {
        Some(secs) => info!("Request Timeout: {}s", secs),
        None => info!("Request Timeout: none"),
    }
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    let app_handle = tokio::spawn(app.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    if shutdown_tx.send(true).is_err() {
        error!("Application stopped before the shutdown signal was sent.");
    }

    match app_handle.await {
        Ok(result) => result?,
        Err(e) => error!("Application task panicked: {:?}", e),
    }

    info!("All tasks shut down. Exiting.");
    Ok(())
}
