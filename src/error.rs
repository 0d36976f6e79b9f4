//! Error types for Parley
//!
//! This module defines the error taxonomy shared by the store, the relay and
//! the HTTP surface, using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Parley operations
///
/// Handlers recover the variant from an `anyhow::Error` with
/// `downcast_ref::<ParleyError>()` to choose a response status.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The submitted message was empty or whitespace only
    #[error("Message cannot be empty")]
    EmptyMessage,

    /// The request body could not be understood
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded the configured size limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// No session exists with the given identifier
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Conversation storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The provider rejected our credentials (401/403)
    #[error("Authentication error: {0}")]
    ProviderAuthentication(String),

    /// The provider is throttling us (429)
    #[error("Rate limit exceeded: {message}")]
    ProviderRateLimited {
        /// Free-text message from the provider
        message: String,
        /// Suggested wait in whole seconds, when the provider gave one
        retry_after: Option<u64>,
    },

    /// The configured model does not exist or is unavailable (404)
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Any other provider failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider call failed after the user turn was stored
    #[error("Relay failed for session {session_id}: {source}")]
    RelayFailed {
        /// Session the turn belongs to
        session_id: String,
        /// Whether the user message is left in the store without a reply
        user_message_persisted: bool,
        /// The classified provider failure
        #[source]
        source: Box<ParleyError>,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ParleyError {
    /// Returns the provider failure behind a relay error, or `self`
    pub fn root_relay_error(&self) -> &ParleyError {
        match self {
            ParleyError::RelayFailed { source, .. } => source.root_relay_error(),
            other => other,
        }
    }
}

/// Result type alias for Parley operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_display() {
        let error = ParleyError::EmptyMessage;
        assert_eq!(error.to_string(), "Message cannot be empty");
    }

    #[test]
    fn test_session_not_found_display() {
        let error = ParleyError::SessionNotFound("01HX".to_string());
        assert_eq!(error.to_string(), "Session not found: 01HX");
    }

    #[test]
    fn test_rate_limited_display_includes_provider_text() {
        let error = ParleyError::ProviderRateLimited {
            message: "Please try again in 30s".to_string(),
            retry_after: Some(30),
        };
        assert!(error.to_string().contains("Please try again in 30s"));
    }

    #[test]
    fn test_root_relay_error_unwraps_nested_source() {
        let error = ParleyError::RelayFailed {
            session_id: "s1".to_string(),
            user_message_persisted: true,
            source: Box::new(ParleyError::ModelNotFound("llama".to_string())),
        };
        assert!(matches!(
            error.root_relay_error(),
            ParleyError::ModelNotFound(_)
        ));
    }

    #[test]
    fn test_root_relay_error_returns_self_for_plain_errors() {
        let error = ParleyError::EmptyMessage;
        assert!(matches!(error.root_relay_error(), ParleyError::EmptyMessage));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ParleyError = io_error.into();
        assert!(matches!(error, ParleyError::Io(_)));
    }

    #[test]
    fn test_anyhow_downcast_recovers_variant() {
        let err: anyhow::Error = ParleyError::SessionNotFound("x".into()).into();
        assert!(matches!(
            err.downcast_ref::<ParleyError>(),
            Some(ParleyError::SessionNotFound(_))
        ));
    }
}
