use crate::notification::wecom::{
    ApiError, SendResponse, TextMessage, TokenResponse, WeComApi,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Token handed out once the scripted token responses run out.
pub const FAKE_TOKEN: &str = "fake-token";

/// A message accepted by `FakeWeComApi`, with the token and the instant it
/// was posted.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub access_token: String,
    pub message: TextMessage,
    pub at: Instant,
}

/// Scriptable in-memory WeCom API.
///
/// Each call pops the next scripted response for its endpoint; once the
/// script is exhausted the endpoint succeeds.
#[derive(Clone, Default)]
pub struct FakeWeComApi {
    token_responses: Arc<Mutex<VecDeque<Result<TokenResponse, ApiError>>>>,
    send_responses: Arc<Mutex<VecDeque<Result<SendResponse, ApiError>>>>,
    token_calls: Arc<Mutex<u32>>,
    send_calls: Arc<Mutex<u32>>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl FakeWeComApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_token_response(&self, response: Result<TokenResponse, ApiError>) {
        self.token_responses.lock().unwrap().push_back(response);
    }

    /// Scripts a successful token response carrying `token`.
    pub fn push_token(&self, token: &str) {
        self.push_token_response(Ok(TokenResponse {
            errcode: 0,
            errmsg: "ok".to_string(),
            access_token: token.to_string(),
        }));
    }

    pub fn push_send_response(&self, response: Result<SendResponse, ApiError>) {
        self.send_responses.lock().unwrap().push_back(response);
    }

    pub fn token_calls(&self) -> u32 {
        *self.token_calls.lock().unwrap()
    }

    /// Number of send attempts, including those answered with an error.
    pub fn send_calls(&self) -> u32 {
        *self.send_calls.lock().unwrap()
    }

    /// Messages the fake answered with a parsed response.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeComApi for FakeWeComApi {
    async fn get_token(
        &self,
        _corp_id: &str,
        _corp_secret: &str,
    ) -> Result<TokenResponse, ApiError> {
        *self.token_calls.lock().unwrap() += 1;
        self.token_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(TokenResponse {
                    errcode: 0,
                    errmsg: "ok".to_string(),
                    access_token: FAKE_TOKEN.to_string(),
                })
            })
    }

    async fn send_message(
        &self,
        access_token: &str,
        message: &TextMessage,
    ) -> Result<SendResponse, ApiError> {
        *self.send_calls.lock().unwrap() += 1;
        let response = self
            .send_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SendResponse::default()));

        if response.is_ok() {
            self.sent.lock().unwrap().push(SentMessage {
                access_token: access_token.to_string(),
                message: message.clone(),
                at: Instant::now(),
            });
        }
        response
    }
}
