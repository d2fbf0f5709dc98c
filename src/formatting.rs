// src/formatting.rs

use crate::core::AlertEvent;
use chrono::NaiveDateTime;

/// Layout used for every human-readable timestamp in a message.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendered when an alert carries no usable start time.
const ZERO_TIME: &str = "0001-01-01 00:00:00";

/// A trait for rendering one alert event into message text.
pub trait TextFormatter: Send + Sync {
    fn format_alert(&self, event: &AlertEvent, sent_at: NaiveDateTime) -> String;
}

/// Formatter producing the fixed WeCom text template, one field per line.
pub struct WeComTextFormatter;

impl TextFormatter for WeComTextFormatter {
    fn format_alert(&self, event: &AlertEvent, sent_at: NaiveDateTime) -> String {
        let starts_at = event
            .starts_at
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| ZERO_TIME.to_string());

        format!(
            "[{}]-{}</br>Project: {}</br>Env: {}</br>Hostname: {}</br>Job: {}</br>Service: {}</br>Level: {}</br>StartAt: {}</br>SendAt: {}",
            event.status,
            event.alert_name,
            event.project,
            event.environment,
            event.hostname,
            event.job,
            event.service,
            event.level,
            starts_at,
            sent_at.format(TIME_FORMAT),
        )
    }
}
