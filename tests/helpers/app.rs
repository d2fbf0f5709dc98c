#![allow(dead_code)]
//! Test helpers for running the full application instance.

use anyhow::Result;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};
use wecom_alert::{
    app::App,
    config::Config,
    internal_metrics::Metrics,
    notification::test_utils::{FakeWeComApi, SentMessage},
    SeverityRecipientMap,
};

/// Represents a running instance of the application for testing purposes.
pub struct TestApp {
    pub addr: SocketAddr,
    pub api: FakeWeComApi,
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: Option<JoinHandle<Result<()>>>,
    client: reqwest::Client,
}

impl TestApp {
    /// Posts a raw webhook body to the application's listener.
    pub async fn post_webhook(&self, body: impl Into<String>) -> Result<reqwest::StatusCode> {
        let response = self
            .client
            .post(format!("http://{}/", self.addr))
            .header("content-type", "application/json")
            .body(body.into())
            .send()
            .await?;
        Ok(response.status())
    }

    /// Polls the fake platform until `count` messages were accepted.
    pub async fn wait_for_messages(
        &self,
        count: usize,
        timeout_duration: Duration,
    ) -> Result<Vec<SentMessage>> {
        timeout(timeout_duration, async {
            loop {
                let sent = self.api.sent_messages();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "expected {} messages, got {}",
                count,
                self.api.sent_messages().len()
            )
        })
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(mut self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .map_err(|_| anyhow::anyhow!("application already stopped"))?;

        if let Some(handle) = self.app_handle.take() {
            match timeout(timeout_duration, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
            }
        } else {
            Ok(())
        }
    }
}

/// A builder for creating `TestApp` instances with specific configurations.
pub struct TestAppBuilder {
    pub config: Config,
    api: FakeWeComApi,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server.listen_address = "127.0.0.1:0".parse().unwrap();
        config.wechat.corp_id = "ww-test-corp".to_string();
        config.wechat.corp_secret = "test-secret".to_string();
        config.wechat.agent_id = 1000002;
        config.levels = SeverityRecipientMap::new(
            [
                ("1".to_string(), "oncall".to_string()),
                ("2".to_string(), "team".to_string()),
                ("3".to_string(), "everyone".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        // Keep the suite fast; pacing itself is covered by the unit tests.
        config.dispatch.rate_limit_ms = 20;
        config.dispatch.retry_backoff_seconds = 0;

        Self {
            config,
            api: FakeWeComApi::new(),
        }
    }

    pub fn with_api(mut self, api: FakeWeComApi) -> Self {
        self.api = api;
        self
    }

    pub fn with_config_modifier(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    /// Builds the application and spawns it.
    pub async fn spawn(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = App::builder(self.config)
            .api_override(Arc::new(self.api.clone()))
            .metrics_override(Metrics::disabled())
            .shutdown_grace(Duration::from_secs(2))
            .build(shutdown_rx)
            .await?;
        let addr = app.listen_addr();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            addr,
            api: self.api,
            shutdown_tx,
            app_handle: Some(app_handle),
            client: reqwest::Client::new(),
        })
    }
}
