//! Command-Line Interface (CLI) argument parsing.
//!
//! Arguments are parsed with `clap` at startup and merged over the
//! configuration file and environment, taking the highest precedence.

use clap::Parser;
use figment::{
    providers::Serialized,
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Relays Alertmanager webhook alerts to WeCom application messages.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the webhook listener binds to.
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Logging level or filter directive.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Capacity of the ingestion queue.
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,
}

/// The subset of `Config` the command line can override.
#[derive(Serialize, Default)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<ServerOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue: Option<QueueOverrides>,
}

#[derive(Serialize)]
struct ServerOverrides {
    listen_address: SocketAddr,
}

#[derive(Serialize)]
struct QueueOverrides {
    capacity: usize,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            log_level: self.log_level.clone(),
            server: self
                .listen
                .map(|listen_address| ServerOverrides { listen_address }),
            queue: self
                .queue_capacity
                .map(|capacity| QueueOverrides { capacity }),
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Serialized::defaults(self.overrides()).data()
    }
}
