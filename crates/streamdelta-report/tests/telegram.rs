//! Integration tests for `TelegramChannel` using wiremock HTTP mocks.

use streamdelta_core::TenantId;
use streamdelta_report::{ChannelError, MessageChannel, TelegramChannel, TextFormat};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn test_channel(base_url: &str) -> TelegramChannel {
    TelegramChannel::with_base_url("123:abc", 30, base_url)
        .expect("channel construction should not fail")
}

fn tenant() -> TenantId {
    TenantId::parse("987654").expect("valid tenant id")
}

#[tokio::test]
async fn send_posts_html_message_to_chat() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(serde_json::json!({
            "chat_id": "987654",
            "text": "⏳ <b>Analyzing 2 playlist(s)...</b>",
            "parse_mode": "HTML",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    test_channel(&server.uri())
        .send(&tenant(), "⏳ <b>Analyzing 2 playlist(s)...</b>", TextFormat::Html)
        .await
        .expect("send should succeed");
}

#[tokio::test]
async fn plain_text_omits_parse_mode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&server)
        .await;

    test_channel(&server.uri())
        .send(&tenant(), "hello", TextFormat::Plain)
        .await
        .expect("send should succeed");

    let requests: Vec<Request> = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = requests[0].body_json().expect("json body");
    assert!(body.get("parse_mode").is_none());
    assert_eq!(body["text"], "hello");
}

#[tokio::test]
async fn long_text_is_truncated_to_message_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&server)
        .await;

    let text = "é".repeat(5_000);
    test_channel(&server.uri())
        .send(&tenant(), &text, TextFormat::Html)
        .await
        .expect("send should succeed");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = requests[0].body_json().expect("json body");
    let sent = body["text"].as_str().expect("text field");
    assert_eq!(sent.chars().count(), 4096);
}

#[tokio::test]
async fn api_rejection_surfaces_description() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found",
        })))
        .mount(&server)
        .await;

    let err = test_channel(&server.uri())
        .send(&tenant(), "hi", TextFormat::Html)
        .await
        .expect_err("should be rejected");

    match err {
        ChannelError::Rejected { status, description } => {
            assert_eq!(status, 400);
            assert_eq!(description, "Bad Request: chat not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_still_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = test_channel(&server.uri())
        .send(&tenant(), "hi", TextFormat::Plain)
        .await
        .expect_err("should fail");

    assert!(matches!(err, ChannelError::Rejected { status: 502, .. }));
}
