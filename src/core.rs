//! Core domain types for wecom-alert
//!
//! This module defines the data structures shared between the ingestion,
//! decoding and dispatch stages of the relay.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One webhook delivery, exactly as received from the monitoring source.
pub type RawPayload = Bytes;

/// A single firing or resolved condition decoded from a webhook payload.
///
/// Every field is best-effort: a label that was absent or of the wrong
/// shape in the payload is an empty string here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertEvent {
    /// `firing` or `resolved`, as reported by the source.
    pub status: String,
    pub alert_name: String,
    pub hostname: String,
    pub environment: String,
    pub job: String,
    pub project: String,
    pub service: String,
    /// The severity key used to route the alert to a recipient.
    pub level: String,
    /// When the alert started, in the offset the source reported it in.
    /// `None` if the timestamp was missing or unparsable.
    pub starts_at: Option<DateTime<FixedOffset>>,
}

/// Static routing table from severity key to recipient identifier.
///
/// Loaded once at startup and read-only for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityRecipientMap(HashMap<String, String>);

impl SeverityRecipientMap {
    pub fn new(levels: HashMap<String, String>) -> Self {
        Self(levels)
    }

    /// Returns the recipient for `level`.
    ///
    /// An unknown level resolves to an empty recipient; the message is still
    /// sent and the platform reports the recipient as invalid.
    pub fn resolve(&self, level: &str) -> &str {
        self.0.get(level).map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SeverityRecipientMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
