//! End-to-end tests for the completion endpoint.
//!
//! The endpoint runs for real on an ephemeral port and talks to a wiremock
//! Gemini backend, so these cover the whole path:
//! HTTP request → prompt composition → Gemini request → HTTP response.

use niva::config::{LlmConfig, ServerConfig};
use niva::llm::CompletionClient;
use niva::llm::server::{GENERATE_PATH, NivaServer};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-pro:generateContent";

fn local() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
    }
}

fn client_for(mock_server: &MockServer) -> CompletionClient {
    CompletionClient::from_config(&LlmConfig {
        api_key: "test-key".to_owned(),
        base_url: mock_server.uri(),
        ..LlmConfig::default()
    })
}

/// The prompt text the backend received in `request`.
fn sent_prompt(request: &Request) -> String {
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .to_owned()
}

async fn post(server: &NivaServer, body: Value) -> (u16, Value) {
    let url = format!("http://{}{GENERATE_PATH}", server.addr());
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ────────────────────────────────────────────────────────────────────────────
// Success Path
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_round_trip_composes_prompt_and_returns_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A stack is LIFO! 📚"}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let server = NivaServer::start(client_for(&mock_server), &local())
        .await
        .unwrap();

    let (status, body) = post(
        &server,
        json!({
            "prompt": "What is a stack?",
            "selectedMood": {"id": "focused", "name": "Focused"},
            "currentTime": "3:00 PM",
            "smallTalkMode": false
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({"response": "A stack is LIFO! 📚"}));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let prompt = sent_prompt(&requests[0]);
    assert!(prompt.contains("Current mood: Focused"));
    assert!(prompt.contains("Current time: 3:00 PM"));
    assert!(prompt.contains("User message: What is a stack?"));
    assert!(!prompt.contains("Current weather:"));
    assert!(!prompt.contains("Small Talk mode"));
}

#[tokio::test]
async fn test_small_talk_and_weather_reach_the_prompt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Try some lo-fi 🎧"}]}}]
        })))
        .mount(&mock_server)
        .await;

    let server = NivaServer::start(client_for(&mock_server), &local())
        .await
        .unwrap();
    let (status, _) = post(
        &server,
        json!({
            "prompt": "suggest a song",
            "selectedMood": {"name": "Casual"},
            "weather": "Sunny, 25°C",
            "smallTalkMode": true
        }),
    )
    .await;
    assert_eq!(status, 200);

    let requests = mock_server.received_requests().await.unwrap();
    let prompt = sent_prompt(&requests[0]);
    assert!(prompt.contains("Current mood: Casual"));
    assert!(prompt.contains("Current weather: Sunny, 25°C"));
    assert!(prompt.contains("User has enabled Small Talk mode"));
}

// ────────────────────────────────────────────────────────────────────────────
// Failure Paths
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_key_never_contacts_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let server = NivaServer::start(CompletionClient::unconfigured(), &local())
        .await
        .unwrap();
    let (status, body) = post(&server, json!({"prompt": "hello"})).await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "API key not configured"}));
}

#[tokio::test]
async fn test_backend_error_message_is_returned() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&mock_server)
        .await;

    let server = NivaServer::start(client_for(&mock_server), &local())
        .await
        .unwrap();
    let (status, body) = post(&server, json!({"prompt": "hello"})).await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Resource has been exhausted"}));
}

#[tokio::test]
async fn test_empty_error_body_uses_generic_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let server = NivaServer::start(client_for(&mock_server), &local())
        .await
        .unwrap();
    let (status, body) = post(&server, json!({"prompt": "hello"})).await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Failed to generate content"}));
}

#[tokio::test]
async fn test_malformed_request_gets_json_error() {
    let mock_server = MockServer::start().await;
    let server = NivaServer::start(client_for(&mock_server), &local())
        .await
        .unwrap();

    let url = format!("http://{}{GENERATE_PATH}", server.addr());
    let resp = reqwest::Client::new()
        .post(&url)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plain_text_request_without_key_reports_missing_key() {
    let server = NivaServer::start(CompletionClient::unconfigured(), &local())
        .await
        .unwrap();

    let url = format!("http://{}{GENERATE_PATH}", server.addr());
    let resp = reqwest::Client::new()
        .post(&url)
        .header("Content-Type", "text/plain;charset=UTF-8")
        .body(r#"{"prompt":"hello"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "API key not configured"}));
}

#[tokio::test]
async fn test_health_reports_configuration() {
    let mock_server = MockServer::start().await;
    let configured = NivaServer::start(client_for(&mock_server), &local())
        .await
        .unwrap();
    let unconfigured = NivaServer::start(CompletionClient::unconfigured(), &local())
        .await
        .unwrap();

    for (server, expected) in [(&configured, true), (&unconfigured, false)] {
        let body: Value = reqwest::get(format!("http://{}/health", server.addr()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok", "configured": expected}));
    }
}
