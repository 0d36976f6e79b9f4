//! Client for a running Parley server
//!
//! [`ApiClient`] wraps every HTTP endpoint; [`state::ClientState`] holds the
//! view model driven by the terminal chat.

pub mod state;

pub use state::{ClientState, Countdown, ErrorBanner};

use crate::server::routes::{CreatedSession, DeletedSession, MessageResponse};
use crate::storage::{Session, SessionSummary};

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Error returned by [`ApiClient`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClientError {
    /// HTTP status, `None` when the server could not be reached
    pub status: Option<u16>,
    /// Server `error` text, or a transport description
    pub message: String,
}

impl ClientError {
    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: None,
            message: format!("Could not reach server: {}", err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Outcome of a provider probe
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeResult {
    /// Always `true` on success
    pub success: bool,
    /// Reply text
    pub response: String,
    /// Model that answered
    pub model: String,
}

/// HTTP client for the Parley API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (for example `http://localhost:5000`)
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or HTTP client initialization fails
    pub fn new(base_url: &str) -> crate::error::Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| {
            crate::error::ParleyError::Config(format!("Invalid server URL {}: {}", base_url, e))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(crate::error::ParleyError::Config(format!(
                "Invalid server URL {}: not an HTTP base URL",
                base_url
            ))
            .into());
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                crate::error::ParleyError::Config(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            base: parsed,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL under `/api`; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| ClientError {
                status: Some(status.as_u16()),
                message: format!("Malformed server response: {}", e),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| format!("Request failed with status {}", status));
        tracing::debug!(status = status.as_u16(), %message, "Server returned error");
        Err(ClientError {
            status: Some(status.as_u16()),
            message,
        })
    }

    /// GET /api/chats
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ClientError> {
        let response = self
            .client
            .get(self.url(&["chats"]))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }

    /// GET /api/chats/:id
    pub async fn get_session(&self, id: &str) -> Result<Session, ClientError> {
        let response = self
            .client
            .get(self.url(&["chats", id]))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }

    /// POST /api/chats
    pub async fn create_session(&self) -> Result<CreatedSession, ClientError> {
        let response = self
            .client
            .post(self.url(&["chats"]))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }

    /// POST /api/chats/:id/message
    pub async fn send_message(&self, id: &str, text: &str) -> Result<MessageResponse, ClientError> {
        let response = self
            .client
            .post(self.url(&["chats", id, "message"]))
            .json(&serde_json::json!({ "message": text }))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }

    /// DELETE /api/chats/:id
    pub async fn delete_session(&self, id: &str) -> Result<DeletedSession, ClientError> {
        let response = self
            .client
            .delete(self.url(&["chats", id]))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }

    /// GET /api/health
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .get(self.url(&["health"]))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }

    /// GET /api/test-groq
    pub async fn probe(&self) -> Result<ProbeResult, ClientError> {
        let response = self
            .client
            .get(self.url(&["test-groq"]))
            .send()
            .await
            .map_err(ClientError::transport)?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(
            client.url(&["chats"]).as_str(),
            "http://localhost:5000/api/chats"
        );
    }

    #[test]
    fn test_session_ids_are_escaped_as_one_segment() {
        let client = ApiClient::new("http://localhost:5000").unwrap();
        assert_eq!(
            client.url(&["chats", "victim?typo#x", "message"]).as_str(),
            "http://localhost:5000/api/chats/victim%3Ftypo%23x/message"
        );
        assert_eq!(
            client.url(&["chats", "a/b"]).path(),
            "/api/chats/a%2Fb"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let client = ApiClient::new("http://proxy.local/parley/").unwrap();
        assert_eq!(
            client.url(&["health"]).as_str(),
            "http://proxy.local/parley/api/health"
        );
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_client_error_displays_message() {
        let err = ClientError {
            status: Some(404),
            message: "Chat session not found".into(),
        };
        assert_eq!(err.to_string(), "Chat session not found");
    }
}
