//! Google Gemini backend.
//!
//! Sends one non-streamed `generateContent` request per prompt and returns
//! the text of the first candidate.
//!
//! # Examples
//!
//! ```rust,no_run
//! use niva::llm::CompletionBackend;
//! use niva::llm::gemini::{GeminiBackend, GeminiConfig};
//!
//! # async fn example() -> Result<(), niva::llm::CompletionError> {
//! let backend = GeminiBackend::new(GeminiConfig::new("AIza...", "gemini-pro"));
//! let text = backend.generate("Say hi").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CompletionBackend, CompletionError};
use crate::config::LlmConfig;

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the Gemini backend.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Base URL (defaults to [`DEFAULT_BASE_URL`]).
    pub base_url: String,
    /// Model name, e.g. `gemini-pro`.
    pub model: String,
    /// Whole-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            model: model.into(),
            timeout: None,
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build from the `[llm]` config section and a resolved credential.
    pub fn from_llm_config(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        let mut out = Self::new(api_key, config.model.clone()).with_base_url(config.base_url.clone());
        if config.request_timeout_s > 0 {
            out = out.with_timeout(Duration::from_secs(config.request_timeout_s));
        }
        out
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Build the JSON request body for a single-turn prompt.
pub fn build_generate_request(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": prompt}],
        }],
    })
}

/// Extract completion text from a `generateContent` response body.
///
/// Concatenates the text parts of the first candidate.
///
/// # Errors
///
/// Returns [`CompletionError::MalformedResponse`] when there is no candidate,
/// the prompt was blocked, or the candidate has no text.
pub fn parse_generate_response(body: &serde_json::Value) -> Result<String, CompletionError> {
    if let Some(reason) = body
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(CompletionError::MalformedResponse(format!(
            "prompt blocked: {reason}"
        )));
    }

    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| CompletionError::MalformedResponse("no candidates in response".into()))?;

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let finish = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("unknown");
        return Err(CompletionError::MalformedResponse(format!(
            "candidate has no text (finishReason: {finish})"
        )));
    }
    Ok(text)
}

/// Extract an error message from a Gemini error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl GeminiBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: GeminiConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|e| {
            warn!("failed to build configured HTTP client, using defaults: {e}");
            reqwest::Client::new()
        });
        Self { config, client }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = self.config.endpoint();
        let body = build_generate_request(prompt);
        debug!(model = %self.config.model, prompt_chars = prompt.len(), "sending generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Backend {
                status: status.as_u16(),
                message: extract_error_message(&body_text),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            CompletionError::MalformedResponse(format!("invalid JSON from Gemini: {e}"))
        })?;
        parse_generate_response(&json)
    }
}
