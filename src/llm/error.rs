//! Error types for the completion client.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`CompletionError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// No backend credential is configured.
    pub const NOT_CONFIGURED: &str = "NOT_CONFIGURED";

    /// The request never got a response (DNS, connect, TLS, timeout).
    pub const TRANSPORT_FAILED: &str = "TRANSPORT_FAILED";

    /// The backend answered with a non-success status.
    pub const BACKEND_ERROR: &str = "BACKEND_ERROR";

    /// The backend answered 2xx but the body had no usable text.
    pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
}

/// Message reported for [`CompletionError::NotConfigured`].
pub const NOT_CONFIGURED_MESSAGE: &str = "API key not configured";

/// Errors produced while requesting a completion.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// No backend credential is configured; no request was attempted.
    #[error("[{}] {}", error_codes::NOT_CONFIGURED, NOT_CONFIGURED_MESSAGE)]
    NotConfigured,

    /// Network-level failure.
    #[error("[{}] {}", error_codes::TRANSPORT_FAILED, .0)]
    Transport(String),

    /// Non-success HTTP status from the backend.
    #[error("[{}] HTTP {status}: {message}", error_codes::BACKEND_ERROR)]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// Response body could not be turned into completion text.
    #[error("[{}] {}", error_codes::MALFORMED_RESPONSE, .0)]
    MalformedResponse(String),
}

impl CompletionError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => error_codes::NOT_CONFIGURED,
            Self::Transport(_) => error_codes::TRANSPORT_FAILED,
            Self::Backend { .. } => error_codes::BACKEND_ERROR,
            Self::MalformedResponse(_) => error_codes::MALFORMED_RESPONSE,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotConfigured => NOT_CONFIGURED_MESSAGE,
            Self::Transport(m) | Self::MalformedResponse(m) => m,
            Self::Backend { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn display_includes_code() {
        let err = CompletionError::Transport("connection refused".into());
        assert_eq!(err.to_string(), "[TRANSPORT_FAILED] connection refused");
        assert_eq!(err.code(), error_codes::TRANSPORT_FAILED);
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn not_configured_message_is_fixed() {
        let err = CompletionError::NotConfigured;
        assert_eq!(err.message(), "API key not configured");
        assert!(err.to_string().starts_with("[NOT_CONFIGURED]"));
    }

    #[test]
    fn backend_error_carries_status() {
        let err = CompletionError::Backend {
            status: 403,
            message: "API key invalid".into(),
        };
        assert_eq!(err.to_string(), "[BACKEND_ERROR] HTTP 403: API key invalid");
        assert_eq!(err.message(), "API key invalid");
    }
}
