//! wecom-alert - relays Alertmanager webhook alerts to WeCom
//!
//! This library provides the ingestion queue, the tolerant alert decoder,
//! the rate-limited dispatcher and the WeCom credential and delivery clients.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod decoder;
pub mod formatting;
pub mod internal_metrics;
pub mod notification;
pub mod queue;
pub mod task_manager;
pub mod utils;
pub mod webhook;

// Re-export core types for convenience
pub use crate::core::*;
