//! Completion client for the generative-language backend.
//!
//! [`CompletionClient`] is constructed once at startup and injected wherever
//! completions are needed. A client without a credential is a normal,
//! constructible state: [`CompletionClient::try_complete`] reports it as
//! [`CompletionError::NotConfigured`] without touching the network, and
//! [`CompletionClient::complete`] degrades it to the fallback reply.

pub mod error;
pub mod gemini;
pub mod server;

pub use error::CompletionError;

use crate::config::LlmConfig;
use async_trait::async_trait;
use gemini::{GeminiBackend, GeminiConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Reply shown to the user whenever a completion cannot be obtained.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble connecting to my neural network right now. Please try again later!";

/// A hosted text-generation service: one prompt in, one completion out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Request a single non-streamed completion.
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Sends composed prompts to the configured backend.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_owned()))
            .finish()
    }
}

impl CompletionClient {
    /// Client backed by `backend`.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Client with no credential configured.
    pub fn unconfigured() -> Self {
        Self { backend: None }
    }

    /// Build a Gemini-backed client from config, or an unconfigured one when
    /// no API key can be resolved.
    pub fn from_config(config: &LlmConfig) -> Self {
        match config.resolved_api_key() {
            Some(key) => {
                let backend = GeminiBackend::new(GeminiConfig::from_llm_config(config, key));
                info!(model = %config.model, "completion backend configured");
                Self::new(Arc::new(backend))
            }
            None => {
                info!("no API key configured, completions disabled");
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Request a completion, reporting every failure to the caller.
    ///
    /// # Errors
    ///
    /// [`CompletionError::NotConfigured`] when no backend is set (no request
    /// is made), otherwise whatever the backend reports.
    pub async fn try_complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let backend = self.backend.as_ref().ok_or(CompletionError::NotConfigured)?;
        let started = Instant::now();
        let result = backend.generate(prompt).await;
        info!(
            backend = backend.name(),
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion finished"
        );
        result
    }

    /// Request a completion for display. Never fails.
    ///
    /// Any error is logged for operators and replaced by [`FALLBACK_REPLY`].
    pub async fn complete(&self, prompt: &str) -> String {
        match self.try_complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(code = e.code(), "completion failed: {e}");
                FALLBACK_REPLY.to_owned()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::testing::ScriptedBackend;
    use super::*;

    #[tokio::test]
    async fn complete_returns_backend_text() {
        let backend = Arc::new(ScriptedBackend::new().reply("A stack is LIFO!"));
        let client = CompletionClient::new(backend.clone());
        assert_eq!(client.complete("What is a stack?").await, "A stack is LIFO!");
        assert_eq!(backend.prompts(), vec!["What is a stack?".to_owned()]);
    }

    #[tokio::test]
    async fn complete_falls_back_on_failure() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .fail(CompletionError::Transport("connection reset".into()))
                .fail(CompletionError::Backend {
                    status: 500,
                    message: "internal".into(),
                })
                .fail(CompletionError::MalformedResponse("no candidates".into())),
        );
        let client = CompletionClient::new(backend);
        for _ in 0..3 {
            assert_eq!(client.complete("hi").await, FALLBACK_REPLY);
        }
    }

    #[tokio::test]
    async fn unconfigured_client_reports_not_configured() {
        let client = CompletionClient::unconfigured();
        assert!(!client.is_configured());
        let err = client.try_complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::NotConfigured));
        assert_eq!(client.complete("hi").await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn try_complete_propagates_backend_error() {
        let backend = Arc::new(ScriptedBackend::new().fail(CompletionError::Backend {
            status: 429,
            message: "quota".into(),
        }));
        let client = CompletionClient::new(backend.clone());
        let err = client.try_complete("hi").await.unwrap_err();
        assert_eq!(err.message(), "quota");
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn from_config_with_key_is_configured() {
        let config = LlmConfig {
            api_key: "k".into(),
            ..LlmConfig::default()
        };
        let client = CompletionClient::from_config(&config);
        assert!(client.is_configured());
        assert!(format!("{client:?}").contains("gemini"));
    }
}
