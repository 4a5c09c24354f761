mod common;

use common::TestServer;
use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn openai_upstream(reply: &str) -> MockServer {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(&upstream)
        .await;
    upstream
}

#[tokio::test]
async fn test_chat_json_round_trip() {
    let upstream = openai_upstream("Hello from the model").await;
    let server = TestServer::start_with(|config| {
        config.chat_api_base = Some(upstream.uri());
        config.chat_api_key = Some("sk-test".to_string());
    })
    .await;

    let response = server
        .post_json("/chat", &json!({ "message": "Hi there" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reply"], "Hello from the model");
}

#[tokio::test]
async fn test_chat_form_message() {
    let upstream = openai_upstream("form reply").await;
    let server = TestServer::start_with(|config| {
        config.chat_api_base = Some(upstream.uri());
        config.chat_api_key = Some("sk-test".to_string());
    })
    .await;

    let response = server
        .client()
        .post(server.url("/chat"))
        .form(&[("message", "  from a form  ")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reply"], "form reply");

    // surrounding whitespace is not forwarded
    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.last().unwrap()["content"], "from a form");
}

#[tokio::test]
async fn test_chat_anthropic_provider() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Claude says hi"}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestServer::start_with(|config| {
        config.chat_provider = "anthropic".to_string();
        config.chat_api_base = Some(upstream.uri());
        config.chat_api_key = Some("sk-ant-test".to_string());
    })
    .await;

    let body: Value = server
        .post_json("/chat", &json!({ "message": "Hi" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["reply"], "Claude says hi");
}

#[tokio::test]
async fn test_chat_empty_message_never_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let server = TestServer::start_with(|config| {
        config.chat_api_base = Some(upstream.uri());
        config.chat_api_key = Some("sk-test".to_string());
    })
    .await;

    for message in ["", "   \n\t"] {
        let response = server.post_json("/chat", &json!({ "message": message })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Message cannot be empty");
    }
}

#[tokio::test]
async fn test_chat_missing_message_field() {
    let server = TestServer::start().await;

    let response = server.post_json("/chat", &json!({ "text": "hi" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_without_api_key() {
    let server = TestServer::start().await;

    let response = server.post_json("/chat", &json!({ "message": "Hi" })).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Chat service is not configured");
}

#[tokio::test]
async fn test_chat_upstream_failure_is_not_leaked() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string("Incorrect API key provided: sk-test"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestServer::start_with(|config| {
        config.chat_api_base = Some(upstream.uri());
        config.chat_api_key = Some("sk-test".to_string());
    })
    .await;

    let response = server.post_json("/chat", &json!({ "message": "Hi" })).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = response.text().await.unwrap();
    assert!(body.contains("Chat service request failed"));
    assert!(!body.contains("sk-test"));
}
