//! Access token cache with expiry-aware, never-give-up renewal.
//!
//! The manager is owned by the dispatch loop and is only ever driven from
//! that one task, so its state needs no lock. Sharing it between several
//! dispatchers would require wrapping it in a `tokio::sync::Mutex`.

use crate::internal_metrics::Metrics;
use crate::notification::wecom::WeComApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};

/// Validity window of a WeCom access token.
pub const TOKEN_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Fixed delay before retrying a failed call to WeCom.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// The manager's view of the current access token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// No token has been fetched yet.
    #[default]
    Empty,
    Holding { token: String, issued_at: Instant },
}

impl Credential {
    /// Whether the credential can still be used at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        match self {
            Credential::Empty => false,
            Credential::Holding { issued_at, .. } => now.duration_since(*issued_at) < ttl,
        }
    }
}

/// Fetches, caches and renews the WeCom access token.
pub struct CredentialManager {
    api: Arc<dyn WeComApi>,
    corp_id: String,
    corp_secret: String,
    ttl: Duration,
    backoff: Duration,
    state: Credential,
    metrics: Arc<Metrics>,
}

impl CredentialManager {
    pub fn new(
        api: Arc<dyn WeComApi>,
        corp_id: String,
        corp_secret: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            api,
            corp_id,
            corp_secret,
            ttl: TOKEN_TTL,
            backoff: RETRY_BACKOFF,
            state: Credential::Empty,
            metrics,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> &Credential {
        &self.state
    }

    /// Returns a usable token, refreshing first if none is held or the held
    /// one has expired.
    pub async fn ensure_valid(&mut self) -> String {
        let now = Instant::now();
        if let Credential::Holding { token, issued_at } = &self.state {
            if self.state.is_fresh(self.ttl, now) {
                return token.clone();
            }
            let expired_for = now.duration_since(*issued_at).saturating_sub(self.ttl);
            info!(
                expired_secs = expired_for.as_secs(),
                "Access token expired, requesting a new one"
            );
        } else {
            info!("No access token held yet, requesting one");
        }
        self.refresh().await
    }

    /// Requests a new token, retrying every backoff interval until the
    /// platform issues one.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> String {
        loop {
            match self.api.get_token(&self.corp_id, &self.corp_secret).await {
                Ok(response) if response.errcode == 0 && !response.access_token.is_empty() => {
                    info!("Obtained a new WeCom access token");
                    self.metrics.token_refreshes_total.increment(1);
                    self.state = Credential::Holding {
                        token: response.access_token.clone(),
                        issued_at: Instant::now(),
                    };
                    return response.access_token;
                }
                Ok(response) => {
                    warn!(
                        errcode = response.errcode,
                        errmsg = %response.errmsg,
                        "WeCom refused to issue an access token, retrying in {}s",
                        self.backoff.as_secs()
                    );
                    self.metrics.increment_platform_retry("gettoken");
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Token request failed, retrying in {}s",
                        self.backoff.as_secs()
                    );
                    self.metrics.increment_transport_retry("gettoken");
                }
            }
            sleep(self.backoff).await;
        }
    }
}
