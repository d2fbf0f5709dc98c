//! Configuration management for wecom-alert
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, a `wecom-alert.toml` file,
//! `WECOM_ALERT_` environment variables and command-line overrides.

use crate::cli::Cli;
use crate::core::SeverityRecipientMap;
use crate::notification::wecom::{MessageTemplate, DEFAULT_API_BASE_URL};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "wecom-alert.toml";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration value `{0}`")]
    Missing(&'static str),

    #[error("configuration file not found: {0}")]
    FileNotFound(String),
}

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, in `tracing_subscriber::EnvFilter` syntax.
    pub log_level: String,
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub wechat: WeChatConfig,
    /// Severity level to WeCom recipient.
    pub levels: SeverityRecipientMap,
    pub dispatch: DispatchConfig,
    pub metrics: MetricsConfig,
}

/// Configuration for the webhook listener.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QueueConfig {
    /// Maximum number of payloads waiting for the dispatcher.
    pub capacity: usize,
}

/// WeCom application credentials and addressing.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WeChatConfig {
    pub corp_id: String,
    pub corp_secret: String,
    pub agent_id: u64,
    pub api_base_url: String,
    pub to_party: String,
    pub to_tag: String,
    /// Timeout for each outbound request. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u64>,
}

impl WeChatConfig {
    pub fn message_template(&self) -> MessageTemplate {
        MessageTemplate {
            agent_id: self.agent_id,
            to_party: self.to_party.clone(),
            to_tag: self.to_tag.clone(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

/// Pacing of the dispatcher and its retries.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Pause after every sent message, in milliseconds.
    pub rate_limit_ms: u64,
    /// Delay before retrying a failed WeCom call, in seconds.
    pub retry_backoff_seconds: u64,
    /// How long an access token is trusted, in seconds.
    pub token_ttl_seconds: u64,
}

impl DispatchConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_seconds)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }
}

/// Configuration for the Prometheus endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

impl Config {
    /// Loads the configuration, layering defaults, the config file, the
    /// environment and the command line, then validates it.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = match &cli.config {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into())
            }
            Some(path) => path.as_path(),
            None => Path::new(DEFAULT_CONFIG_PATH),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. WECOM_ALERT_WECHAT__CORP_SECRET=...
            .merge(Env::prefixed("WECOM_ALERT_").split("__"))
            .merge(cli.clone())
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wechat.corp_id.is_empty() {
            return Err(ConfigError::Missing("wechat.corp_id"));
        }
        if self.wechat.corp_secret.is_empty() {
            return Err(ConfigError::Missing("wechat.corp_secret"));
        }
        if self.wechat.agent_id == 0 {
            return Err(ConfigError::Missing("wechat.agent_id"));
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 9000)),
            },
            queue: QueueConfig {
                capacity: DEFAULT_QUEUE_CAPACITY,
            },
            wechat: WeChatConfig {
                corp_id: String::new(),
                corp_secret: String::new(),
                agent_id: 0,
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                to_party: "PartyID1 | PartyID2".to_string(),
                to_tag: "TagID1 | TagID2".to_string(),
                request_timeout_seconds: None,
            },
            levels: SeverityRecipientMap::default(),
            dispatch: DispatchConfig {
                rate_limit_ms: 1000,
                retry_backoff_seconds: 5,
                token_ttl_seconds: 2 * 60 * 60,
            },
            metrics: MetricsConfig::default(),
        }
    }
}
