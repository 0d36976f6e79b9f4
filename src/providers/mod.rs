//! Provider module for Parley
//!
//! This module contains the generation provider abstraction and the Groq
//! implementation.

pub mod base;
pub mod fake;
pub mod groq;

pub use base::{
    classify_status, parse_wait_hint, ChatMessage, Completion, Provider, TokenUsage,
};
pub use groq::GroqProvider;

use crate::config::ProviderConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create the provider described by the configuration
///
/// # Errors
///
/// Returns error if provider initialization fails (for example a missing API key)
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(GroqProvider::new(config.clone())?))
}
