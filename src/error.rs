//! Error types for the niva pipeline.

use crate::llm::CompletionError;

/// Top-level error type for the chatbot pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NivaError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),

    /// Speech recognition or synthesis error.
    #[error("speech error: {0}")]
    Speech(String),

    /// Completion backend error.
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NivaError>;
