//! Tolerant extraction of alert events from Alertmanager-style payloads.
//!
//! Only a payload that is not JSON at all is an error. Every other lookup
//! degrades to an empty value: a missing `alerts` array yields no events, a
//! missing or non-string label yields an empty string, an unparsable
//! `startsAt` yields no start time.

use crate::core::AlertEvent;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Decodes one raw webhook payload into its alert events, in array order.
pub fn decode(payload: &[u8]) -> Result<Vec<AlertEvent>, DecodeError> {
    let document: Value =
        serde_json::from_slice(payload).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let events = document
        .get("alerts")
        .and_then(Value::as_array)
        .map(|alerts| alerts.iter().map(decode_alert).collect())
        .unwrap_or_default();

    Ok(events)
}

fn decode_alert(alert: &Value) -> AlertEvent {
    let labels = alert.get("labels").unwrap_or(&Value::Null);

    // `level` is the routing label; `severity` is the Alertmanager convention.
    let level = match labels.get("level") {
        Some(value) => string_of(Some(value)),
        None => string_of(labels.get("severity")),
    };

    AlertEvent {
        status: string_of(alert.get("status")),
        alert_name: string_of(labels.get("alertname")),
        hostname: string_of(labels.get("hostname")),
        environment: string_of(labels.get("env")),
        job: string_of(labels.get("job")),
        project: string_of(labels.get("project")),
        service: string_of(labels.get("service")),
        level,
        starts_at: alert
            .get("startsAt")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
    }
}

fn string_of(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parses an ISO-8601 timestamp carrying a UTC offset, keeping that offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}
