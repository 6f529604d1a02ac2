//! HTTP completion endpoint.
//!
//! Composes Niva's prompt from the request fields and forwards it to the
//! injected [`CompletionClient`].
//!
//! ## Endpoints
//!
//! - `POST /api/gemini`: one completion per request
//! - `GET /health`: liveness plus whether a credential is configured

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::NivaError;
use crate::llm::error::NOT_CONFIGURED_MESSAGE;
use crate::llm::{CompletionClient, CompletionError};
use crate::prompt::{PromptInputs, compose_from};

/// Path of the completion route.
pub const GENERATE_PATH: &str = "/api/gemini";

/// Error body used when the backend error carries no message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate content";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Completion request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// The user's utterance.
    #[serde(default)]
    pub prompt: String,
    /// Mood selected in the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_mood: Option<SelectedMood>,
    /// Client-side local time string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    /// Client-side weather summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    /// Whether small-talk mode is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_talk_mode: Option<bool>,
}

/// The part of a client mood the endpoint cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedMood {
    #[serde(default)]
    pub name: String,
}

/// Successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

/// Failed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub configured: bool,
}

impl GenerateRequest {
    /// Prompt inputs drawn from the request, with the same defaults a
    /// session starts with.
    pub fn prompt_inputs(&self) -> PromptInputs<'_> {
        let defaults = PromptInputs::default();
        PromptInputs {
            mood: self
                .selected_mood
                .as_ref()
                .map(|m| m.name.as_str())
                .filter(|name| !name.is_empty())
                .unwrap_or(defaults.mood),
            current_time: self.current_time.as_deref().unwrap_or(""),
            weather: self.weather.as_deref().unwrap_or(""),
            small_talk: self.small_talk_mode.unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    client: CompletionClient,
}

/// Build the router. Exposed so hosts can nest it or serve it themselves.
pub fn router(client: CompletionClient) -> Router {
    Router::new()
        .route(GENERATE_PATH, post(handle_generate))
        .route("/health", get(handle_health))
        .with_state(AppState { client })
}

// ---------------------------------------------------------------------------
// NivaServer
// ---------------------------------------------------------------------------

/// The completion endpoint, served from a background tokio task.
pub struct NivaServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl NivaServer {
    /// Start the server.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and begins serving in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(client: CompletionClient, config: &ServerConfig) -> crate::error::Result<Self> {
        if !client.is_configured() {
            warn!("starting without an API key; {GENERATE_PATH} will answer 500");
        }
        let app = router(client);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| NivaError::Server(format!("bind {bind_addr} failed: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| NivaError::Server(format!("failed to get local addr: {e}")))?;

        info!("completion endpoint listening on http://{addr}{GENERATE_PATH}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// Wait until the server task ends.
    pub async fn wait(&mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for NivaServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

fn error_reply(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    let body = ErrorResponse {
        error: message.into(),
    };
    let json = serde_json::to_value(body).unwrap_or_default();
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json))
}

/// `POST /api/gemini`.
///
/// The body is parsed as JSON whatever its content type, and a body that
/// does not parse gets the same 500 `{ "error": .. }` shape as a failed
/// completion.
async fn handle_generate(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let request_id = Uuid::new_v4();

    let request: GenerateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(%request_id, "rejecting unparseable request: {e}");
            return error_reply(e.to_string());
        }
    };

    if !state.client.is_configured() {
        warn!(%request_id, "rejecting request: {NOT_CONFIGURED_MESSAGE}");
        return error_reply(NOT_CONFIGURED_MESSAGE);
    }

    let prompt = compose_from(request.prompt_inputs(), &request.prompt);

    match state.client.try_complete(&prompt).await {
        Ok(text) => {
            info!(%request_id, reply_chars = text.len(), "completion served");
            let json = serde_json::to_value(GenerateResponse { response: text }).unwrap_or_default();
            (StatusCode::OK, Json(json))
        }
        Err(CompletionError::NotConfigured) => error_reply(NOT_CONFIGURED_MESSAGE),
        Err(e) => {
            error!(%request_id, code = e.code(), "error calling backend: {e}");
            let message = e.message();
            if message.is_empty() {
                error_reply(GENERIC_FAILURE_MESSAGE)
            } else {
                error_reply(message)
            }
        }
    }
}

/// `GET /health`.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        configured: state.client.is_configured(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::llm::testing::ScriptedBackend;
    use std::sync::Arc;

    fn local() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        }
    }

    #[test]
    fn request_accepts_camel_case_fields() {
        let json = r##"{
            "prompt": "hi",
            "selectedMood": {"id": "calm", "name": "Calm", "color": "#D1D5DB"},
            "currentTime": "09:30 AM",
            "weather": "Sunny, 25°C",
            "smallTalkMode": true
        }"##;
        let req: GenerateRequest = serde_json::from_str(json).unwrap();
        let inputs = req.prompt_inputs();
        assert_eq!(inputs.mood, "Calm");
        assert_eq!(inputs.current_time, "09:30 AM");
        assert_eq!(inputs.weather, "Sunny, 25°C");
        assert!(inputs.small_talk);
    }

    #[test]
    fn request_optional_fields_default() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        let inputs = req.prompt_inputs();
        assert_eq!(inputs.mood, "Focused");
        assert_eq!(inputs.current_time, "");
        assert_eq!(inputs.weather, "");
        assert!(!inputs.small_talk);
    }

    #[test]
    fn empty_mood_name_defaults_to_focused() {
        let req: GenerateRequest =
            serde_json::from_str(r#"{"prompt":"hi","selectedMood":{}}"#).unwrap();
        assert_eq!(req.prompt_inputs().mood, "Focused");
    }

    #[tokio::test]
    async fn unconfigured_returns_500_without_backend_call() {
        let server = NivaServer::start(CompletionClient::unconfigured(), &local())
            .await
            .unwrap();
        let url = format!("http://{}{GENERATE_PATH}", server.addr());
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({"prompt": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(body.error, "API key not configured");
    }

    #[tokio::test]
    async fn plain_text_body_is_parsed_as_json() {
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
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(body.error, "API key not configured");
    }

    #[tokio::test]
    async fn unparseable_body_returns_500_json() {
        let backend = Arc::new(ScriptedBackend::new().reply("unused"));
        let server = NivaServer::start(CompletionClient::new(backend.clone()), &local())
            .await
            .unwrap();
        let url = format!("http://{}{GENERATE_PATH}", server.addr());
        let resp = reqwest::Client::new()
            .post(&url)
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = resp.json().await.unwrap();
        assert!(!body.error.is_empty());
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn missing_prompt_still_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::new().reply("Hi there 👋"));
        let server = NivaServer::start(CompletionClient::new(backend.clone()), &local())
            .await
            .unwrap();
        let url = format!("http://{}{GENERATE_PATH}", server.addr());
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({"selectedMood": {"name": "Calm"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Current mood: Calm"));
    }

    #[tokio::test]
    async fn success_returns_response_and_composed_prompt() {
        let backend = Arc::new(ScriptedBackend::new().reply("Stacks are LIFO ✨"));
        let server = NivaServer::start(CompletionClient::new(backend.clone()), &local())
            .await
            .unwrap();
        let url = format!("http://{}{GENERATE_PATH}", server.addr());
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({
                "prompt": "What is a stack?",
                "selectedMood": {"name": "Focused"},
                "currentTime": "3:00 PM",
                "smallTalkMode": false
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: GenerateResponse = resp.json().await.unwrap();
        assert_eq!(body.response, "Stacks are LIFO ✨");

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Current mood: Focused"));
        assert!(prompts[0].contains("Current time: 3:00 PM"));
        assert!(prompts[0].contains("What is a stack?"));
        assert!(!prompts[0].contains("Small Talk mode"));
    }

    #[tokio::test]
    async fn backend_failure_returns_500_with_message() {
        let backend = Arc::new(ScriptedBackend::new().fail(CompletionError::Backend {
            status: 400,
            message: "API key not valid".into(),
        }));
        let server = NivaServer::start(CompletionClient::new(backend), &local())
            .await
            .unwrap();
        let url = format!("http://{}{GENERATE_PATH}", server.addr());
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({"prompt": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = resp.json().await.unwrap();
        assert_eq!(body.error, "API key not valid");
    }

    #[tokio::test]
    async fn empty_error_message_uses_generic_text() {
        let backend = Arc::new(ScriptedBackend::new().fail(CompletionError::Transport(String::new())));
        let server = NivaServer::start(CompletionClient::new(backend), &local())
            .await
            .unwrap();
        let url = format!("http://{}{GENERATE_PATH}", server.addr());
        let body: ErrorResponse = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({"prompt": "hello"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.error, GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn health_reports_configuration() {
        let server = NivaServer::start(CompletionClient::unconfigured(), &local())
            .await
            .unwrap();
        let body: HealthResponse = reqwest::get(format!("http://{}/health", server.addr()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.status, "ok");
        assert!(!body.configured);
    }
}
