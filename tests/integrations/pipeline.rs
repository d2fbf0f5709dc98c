//! End-to-end tests of the relay against a fake WeCom platform.

use anyhow::Result;
use std::time::Duration;
use wecom_alert::notification::{
    test_utils::{FakeWeComApi, FAKE_TOKEN},
    wecom::{ApiError, SendResponse},
};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{app::TestAppBuilder, payloads::alertmanager_payload};

#[tokio::test]
async fn test_every_alert_becomes_one_message() -> Result<()> {
    let app = TestAppBuilder::new().spawn().await?;

    let status = app
        .post_webhook(alertmanager_payload(&[("HighCpu", "1"), ("DiskFull", "2"), ("Oom", "3")]))
        .await?;
    assert_eq!(status, reqwest::StatusCode::OK);

    let sent = app.wait_for_messages(3, Duration::from_secs(5)).await?;
    assert_eq!(sent.len(), 3);

    let recipients: Vec<&str> = sent.iter().map(|m| m.message.touser.as_str()).collect();
    assert_eq!(recipients, vec!["oncall", "team", "everyone"]);
    for sent in &sent {
        assert_eq!(sent.access_token, FAKE_TOKEN);
        assert_eq!(sent.message.agentid, 1000002);
        assert_eq!(sent.message.msgtype, "text");
    }
    assert!(sent[0].message.text.content.starts_with(
        "[firing]-HighCpu</br>Project: shop</br>Env: prod</br>Hostname: web-01</br>Job: node</br>Service: api</br>Level: 1</br>StartAt: 2024-03-05 10:20:30</br>SendAt: "
    ));

    // One token serves all sends while it is fresh.
    assert_eq!(app.api.token_calls(), 1);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_payloads_are_relayed_in_arrival_order() -> Result<()> {
    let app = TestAppBuilder::new().spawn().await?;

    for name in ["first", "second", "third"] {
        app.post_webhook(alertmanager_payload(&[(name, "1")])).await?;
    }

    let sent = app.wait_for_messages(3, Duration::from_secs(5)).await?;
    let names: Vec<bool> = ["first", "second", "third"]
        .iter()
        .zip(&sent)
        .map(|(name, sent)| sent.message.text.content.starts_with(&format!("[firing]-{}</br>", name)))
        .collect();
    assert_eq!(names, vec![true, true, true]);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_malformed_payload_does_not_stop_delivery() -> Result<()> {
    let app = TestAppBuilder::new().spawn().await?;

    let status = app.post_webhook("this is not json").await?;
    // The webhook source is always acknowledged.
    assert_eq!(status, reqwest::StatusCode::OK);
    app.post_webhook(alertmanager_payload(&[("AfterGarbage", "1")])).await?;

    let sent = app.wait_for_messages(1, Duration::from_secs(5)).await?;
    assert!(sent[0].message.text.content.starts_with("[firing]-AfterGarbage"));

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_rejected_message_is_not_retried() -> Result<()> {
    let api = FakeWeComApi::new();
    api.push_send_response(Ok(SendResponse {
        errcode: 75001,
        errmsg: "invalid param".to_string(),
        invaliduser: String::new(),
    }));
    let app = TestAppBuilder::new().with_api(api).spawn().await?;

    app.post_webhook(alertmanager_payload(&[("Rejected", "1"), ("Accepted", "1")]))
        .await?;

    let sent = app.wait_for_messages(2, Duration::from_secs(5)).await?;
    assert_eq!(app.api.send_calls(), 2);
    assert!(sent[1].message.text.content.starts_with("[firing]-Accepted"));

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_outages_are_ridden_out() -> Result<()> {
    let api = FakeWeComApi::new();
    api.push_token_response(Err(ApiError::Transport("connection refused".to_string())));
    api.push_token_response(Err(ApiError::Transport("connection refused".to_string())));
    api.push_token("recovered-token");
    api.push_send_response(Err(ApiError::Status(503)));
    let app = TestAppBuilder::new().with_api(api).spawn().await?;

    app.post_webhook(alertmanager_payload(&[("DuringOutage", "2")])).await?;

    let sent = app.wait_for_messages(1, Duration::from_secs(5)).await?;
    assert_eq!(sent[0].access_token, "recovered-token");
    assert_eq!(app.api.token_calls(), 3);
    assert_eq!(app.api.send_calls(), 2);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_unknown_level_is_sent_to_empty_recipient() -> Result<()> {
    let app = TestAppBuilder::new().spawn().await?;

    app.post_webhook(alertmanager_payload(&[("Unrouted", "9")])).await?;

    let sent = app.wait_for_messages(1, Duration::from_secs(5)).await?;
    assert_eq!(sent[0].message.touser, "");

    app.shutdown(Duration::from_secs(5)).await
}
