//! Posts formatted messages to WeCom.

use crate::internal_metrics::Metrics;
use crate::notification::credentials::RETRY_BACKOFF;
use crate::notification::wecom::{TextMessage, WeComApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Final result of delivering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// WeCom accepted the message. `invalid_user` lists recipients it could
    /// not reach, if any.
    Delivered { invalid_user: Option<String> },
    /// WeCom rejected the message. Rejections are final.
    Rejected { errcode: i64, errmsg: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

pub struct DeliveryClient {
    api: Arc<dyn WeComApi>,
    backoff: Duration,
    metrics: Arc<Metrics>,
}

impl DeliveryClient {
    pub fn new(api: Arc<dyn WeComApi>, metrics: Arc<Metrics>) -> Self {
        Self {
            api,
            backoff: RETRY_BACKOFF,
            metrics,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sends `message` with `access_token`.
    ///
    /// Calls that fail before WeCom answers are repeated with the same token
    /// until one gets an answer. A non-zero error code in the answer is
    /// returned as `Rejected` without retrying.
    #[instrument(skip_all, fields(touser = %message.touser))]
    pub async fn send(&self, access_token: &str, message: &TextMessage) -> DeliveryOutcome {
        let response = loop {
            match self.api.send_message(access_token, message).await {
                Ok(response) => break response,
                Err(e) => {
                    warn!(
                        error = %e,
                        "Sending message to WeCom failed, retrying in {}s",
                        self.backoff.as_secs()
                    );
                    self.metrics.increment_transport_retry("message_send");
                    sleep(self.backoff).await;
                }
            }
        };

        if !response.invaliduser.is_empty() {
            warn!(
                invalid_user = %response.invaliduser,
                "WeCom could not deliver to some recipients"
            );
        }

        if response.errcode == 0 {
            info!(content = %message.text.content, "Alert message delivered to WeCom");
            self.metrics.messages_delivered_total.increment(1);
            DeliveryOutcome::Delivered {
                invalid_user: Some(response.invaliduser).filter(|u| !u.is_empty()),
            }
        } else {
            error!(
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "WeCom rejected alert message"
            );
            self.metrics.messages_rejected_total.increment(1);
            DeliveryOutcome::Rejected {
                errcode: response.errcode,
                errmsg: response.errmsg,
            }
        }
    }
}
