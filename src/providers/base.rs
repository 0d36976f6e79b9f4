//! Base provider trait and common types for Parley
//!
//! This module defines the Provider trait that the relay talks to, the
//! message and completion types exchanged with it, and the classification of
//! provider failures into the crate error taxonomy.

use crate::error::{ParleyError, Result};
use crate::storage::{Message, Role};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Message structure sent to the provider
///
/// Unlike stored [`Message`]s this carries no timestamp and allows the
/// `system` role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Creates a new system message
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::ChatMessage;
    ///
    /// let msg = ChatMessage::system("You are a helpful assistant");
    /// assert_eq!(msg.role, "system");
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User.as_str().to_string(),
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant.as_str().to_string(),
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Token usage information from a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Generated reply from a provider
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Reply text
    pub content: String,
    /// Model that produced the reply
    pub model: String,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// Creates a completion without usage information
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
        }
    }
}

/// A text generation provider
///
/// One call is one round trip: implementations do not retry, back off, or
/// account for rate limits locally.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generates a reply for the ordered conversation
    ///
    /// # Errors
    ///
    /// Returns a classified [`ParleyError`]: `ProviderAuthentication`,
    /// `ProviderRateLimited`, `ModelNotFound` or `Provider`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;

    /// Identifier of the model used for completions
    fn model(&self) -> String;
}

/// Maps an unsuccessful provider response to the crate error taxonomy
///
/// `retry_after_header` is the raw `retry-after` header, consulted when the
/// message text carries no wait hint.
pub fn classify_status(
    status: u16,
    message: &str,
    retry_after_header: Option<&str>,
    model: &str,
) -> ParleyError {
    match status {
        401 | 403 => ParleyError::ProviderAuthentication(message.to_string()),
        429 => {
            let retry_after = parse_wait_hint(message).or_else(|| {
                retry_after_header
                    .and_then(|h| h.trim().parse::<f64>().ok())
                    .map(seconds_ceil)
            });
            ParleyError::ProviderRateLimited {
                message: message.to_string(),
                retry_after,
            }
        }
        404 => ParleyError::ModelNotFound(format!("{} ({})", model, message)),
        _ => ParleyError::Provider(format!("Provider returned error {}: {}", status, message)),
    }
}

fn wait_hint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)try again in\s+([0-9][0-9hms.]*)").expect("wait hint pattern is valid")
    })
}

/// Extracts the suggested wait from provider text, in whole seconds
///
/// Understands duration strings such as `30s`, `9.55s`, `1m2.5s`, `2h1m`
/// and `450ms`, following "try again in". Fractions round up.
///
/// # Examples
///
/// ```
/// use parley::providers::parse_wait_hint;
///
/// assert_eq!(parse_wait_hint("Please try again in 30s."), Some(30));
/// assert_eq!(parse_wait_hint("Please try again in 1m2.5s"), Some(63));
/// assert_eq!(parse_wait_hint("Slow down"), None);
/// ```
pub fn parse_wait_hint(text: &str) -> Option<u64> {
    let raw = wait_hint_regex().captures(text)?.get(1)?.as_str();
    parse_duration_secs(raw.trim_end_matches('.')).map(seconds_ceil)
}

fn seconds_ceil(secs: f64) -> u64 {
    if secs <= 0.0 {
        0
    } else {
        secs.ceil() as u64
    }
}

/// Parses a compound duration (`1h2m3.5s`, `450ms`) into seconds
fn parse_duration_secs(raw: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut rest = raw;
    let mut matched = false;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let (scale, unit_len) = if rest.starts_with("ms") {
            (0.001, 2)
        } else if rest.starts_with('h') {
            (3600.0, 1)
        } else if rest.starts_with('m') {
            (60.0, 1)
        } else if rest.starts_with('s') {
            (1.0, 1)
        } else {
            return None;
        };
        total += value * scale;
        rest = &rest[unit_len..];
        matched = true;
    }

    matched.then_some(total)
}
