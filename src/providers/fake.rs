//! In-process fake provider for relay and router tests
//!
//! [`ScriptedProvider`] replaces network calls with a queue of canned
//! outcomes and records every conversation it was asked to complete, so
//! tests can assert on the exact context the relay sent.
//!
//! When the queue is empty the provider echoes the last user message.
//!
//! # Example
//!
//! ```
//! use parley::providers::fake::ScriptedProvider;
//! use parley::providers::{ChatMessage, Provider};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = ScriptedProvider::new().with_reply("Hi there!");
//! let completion = provider.complete(&[ChatMessage::user("Hello")]).await.unwrap();
//! assert_eq!(completion.content, "Hi there!");
//! assert_eq!(provider.calls()[0].len(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ParleyError, Result};
use crate::providers::{ChatMessage, Completion, Provider};

/// Provider test double with scripted outcomes
#[derive(Debug)]
pub struct ScriptedProvider {
    model: String,
    outcomes: Mutex<VecDeque<std::result::Result<String, ParleyError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    delay: Option<Duration>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Creates a provider with an empty script
    pub fn new() -> Self {
        Self {
            model: "scripted-model".to_string(),
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queues a successful reply
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queues a failure
    pub fn with_error(self, error: ParleyError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleeps this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, outcome: std::result::Result<String, ParleyError>) {
        self.outcomes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(outcome);
    }

    /// Every conversation passed to `complete`, in call order
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of `complete` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .outcomes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(Completion::new(text, &self.model)),
            Some(Err(error)) => Err(error.into()),
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == "user")
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                Ok(Completion::new(format!("echo: {}", last_user), &self.model))
            }
        }
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_runs_in_order_then_echoes() {
        let provider = ScriptedProvider::new()
            .with_reply("first")
            .with_error(ParleyError::Provider("boom".into()));

        let msgs = [ChatMessage::user("ping")];
        assert_eq!(provider.complete(&msgs).await.unwrap().content, "first");
        assert!(provider.complete(&msgs).await.is_err());
        assert_eq!(
            provider.complete(&msgs).await.unwrap().content,
            "echo: ping"
        );
        assert_eq!(provider.call_count(), 3);
    }
}
