//! Groq provider implementation for Parley
//!
//! This module implements the Provider trait against Groq's OpenAI-compatible
//! chat completions endpoint. Any server speaking the same wire format can be
//! targeted through `provider.api_base`.

use crate::config::ProviderConfig;
use crate::error::{ParleyError, Result};
use crate::providers::{classify_status, ChatMessage, Completion, Provider, TokenUsage};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Groq API provider
///
/// # Examples
///
/// ```no_run
/// use parley::config::ProviderConfig;
/// use parley::providers::{ChatMessage, GroqProvider, Provider};
///
/// # async fn example() -> parley::error::Result<()> {
/// let config = ProviderConfig {
///     api_key: Some("gsk_...".to_string()),
///     ..Default::default()
/// };
/// let provider = GroqProvider::new(config)?;
/// let completion = provider.complete(&[ChatMessage::user("Hello!")]).await?;
/// println!("{}", completion.content);
/// # Ok(())
/// # }
/// ```
pub struct GroqProvider {
    client: Client,
    config: ProviderConfig,
    api_key: String,
}

/// Request structure for the chat completions API
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Response structure from the chat completions API
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pulls the human-readable message out of an error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

impl GroqProvider {
    /// Create a new Groq provider instance
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is set, or an error if
    /// HTTP client initialization fails
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ParleyError::Config("GROQ_API_KEY is not set; the provider needs an API key".into())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Groq provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Provider for GroqProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        tracing::debug!(
            "Sending completion request: {} messages, model={}",
            messages.len(),
            self.config.model
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to reach provider: {}", e);
                if e.is_timeout() {
                    ParleyError::Provider("Provider request timed out".to_string())
                } else {
                    ParleyError::Provider(format!("Failed to reach provider: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            tracing::error!("Provider returned error {}: {}", status, message);
            return Err(classify_status(
                status.as_u16(),
                &message,
                retry_after.as_deref(),
                &self.config.model,
            )
            .into());
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse provider response: {}", e);
            ParleyError::Provider(format!("Failed to parse provider response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ParleyError::Provider("Provider returned no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));
        if let Some(usage) = usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion received"
            );
        }

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            usage,
        })
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}
