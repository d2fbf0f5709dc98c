//! A client for the WeCom (WeChat Work) application messaging API.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Public endpoint of the WeCom server API.
pub const DEFAULT_API_BASE_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin";

/// Failures that never produced a platform response.
///
/// All of these are retried by the caller; the platform's own error codes
/// arrive inside a parsed response instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("request to WeCom failed: {0}")]
    Transport(String),

    #[error("WeCom responded with HTTP status {0}")]
    Status(u16),

    #[error("unreadable WeCom response: {0}")]
    InvalidResponse(String),
}

/// Response of the `gettoken` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenResponse {
    pub errcode: i64,
    pub errmsg: String,
    pub access_token: String,
}

/// Response of the `message/send` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SendResponse {
    pub errcode: i64,
    pub errmsg: String,
    /// `|`-separated recipients the platform could not deliver to.
    pub invaliduser: String,
}

/// Body of a `text` application message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextMessage {
    pub touser: String,
    pub toparty: String,
    pub totag: String,
    pub msgtype: String,
    pub agentid: u64,
    pub text: TextContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextContent {
    pub content: String,
}

/// The fixed addressing fields shared by every message the relay sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub agent_id: u64,
    pub to_party: String,
    pub to_tag: String,
}

impl MessageTemplate {
    /// Builds a text message for `touser` carrying `content`.
    pub fn text(&self, touser: &str, content: String) -> TextMessage {
        TextMessage {
            touser: touser.to_string(),
            toparty: self.to_party.clone(),
            totag: self.to_tag.clone(),
            msgtype: "text".to_string(),
            agentid: self.agent_id,
            text: TextContent { content },
        }
    }
}

/// The two WeCom endpoints the relay depends on.
#[async_trait]
pub trait WeComApi: Send + Sync {
    /// Requests a fresh access token for the given corp credentials.
    async fn get_token(&self, corp_id: &str, corp_secret: &str)
        -> Result<TokenResponse, ApiError>;

    /// Posts one application message, authorized by `access_token`.
    async fn send_message(
        &self,
        access_token: &str,
        message: &TextMessage,
    ) -> Result<SendResponse, ApiError>;
}

/// `WeComApi` over HTTPS.
pub struct HttpWeComApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWeComApi {
    /// Creates a client rooted at `base_url`.
    ///
    /// Without a `timeout`, requests wait for the platform indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Reads and parses a platform response.
    ///
    /// Only a success status carries a platform answer. Any other status is
    /// reported as a status error, whatever its body.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl WeComApi for HttpWeComApi {
    #[instrument(skip_all)]
    async fn get_token(
        &self,
        corp_id: &str,
        corp_secret: &str,
    ) -> Result<TokenResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/gettoken", self.base_url))
            .query(&[("corpid", corp_id), ("corpsecret", corp_secret)])
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(status = %response.status(), "Token endpoint responded");

        Self::parse_response(response).await
    }

    #[instrument(skip_all, fields(touser = %message.touser))]
    async fn send_message(
        &self,
        access_token: &str,
        message: &TextMessage,
    ) -> Result<SendResponse, ApiError> {
        let response = self
            .client
            .post(format!("{}/message/send", self.base_url))
            .query(&[("access_token", access_token)])
            .json(message)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(status = %response.status(), "Send endpoint responded");

        Self::parse_response(response).await
    }
}
