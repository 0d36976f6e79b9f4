//! Configuration management for Parley
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::cli::{Cli, Commands};
use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Generation provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Session persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Per-address request limiter
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Terminal client settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted request body size (bytes)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key; normally supplied through `GROQ_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model identifier sent with every completion
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt placed ahead of the history; empty disables it
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in the generated reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout for one provider round trip (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_provider_timeout() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persistence connection string; defaults to the user data directory
    #[serde(default)]
    pub database_url: Option<String>,

    /// Keep sessions in memory only
    #[serde(default)]
    pub ephemeral: bool,
}

/// Request limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per client address per window
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Window length (seconds)
    #[serde(default = "default_rate_limit_window")]
    pub window_seconds: u64,

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    15 * 60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_seconds: default_rate_limit_window(),
            trust_forwarded_for: false,
        }
    }
}

/// Terminal client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a running Parley server
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ParleyError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| ParleyError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_key) = std::env::var("GROQ_API_KEY") {
            if !api_key.trim().is_empty() {
                self.provider.api_key = Some(api_key.trim().to_string());
            }
        }

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            self.storage.database_url = Some(database_url);
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid PORT: {}", port);
            }
        }

        if let Ok(host) = std::env::var("PARLEY_HOST") {
            self.server.host = host;
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            self.provider.model = model;
        }

        if let Ok(api_base) = std::env::var("PARLEY_API_BASE") {
            self.provider.api_base = api_base;
        }

        if let Ok(prompt) = std::env::var("PARLEY_SYSTEM_PROMPT") {
            self.provider.system_prompt = prompt;
        }

        if let Ok(origins) = std::env::var("PARLEY_CORS_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !origins.is_empty() {
                tracing::debug!(?origins, "Env override: PARLEY_CORS_ORIGINS");
                self.server.cors_origins = origins;
            }
        }

        if let Ok(max) = std::env::var("PARLEY_RATE_LIMIT_MAX") {
            match max.parse::<u32>() {
                Ok(v) => self.rate_limit.max_requests = v,
                Err(_) => tracing::warn!("Invalid PARLEY_RATE_LIMIT_MAX: {}", max),
            }
        }

        if let Ok(window) = std::env::var("PARLEY_RATE_LIMIT_WINDOW_SECS") {
            match window.parse::<u64>() {
                Ok(v) => self.rate_limit.window_seconds = v,
                Err(_) => tracing::warn!("Invalid PARLEY_RATE_LIMIT_WINDOW_SECS: {}", window),
            }
        }

        if let Ok(url) = std::env::var("PARLEY_SERVER_URL") {
            self.client.server_url = url;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Serve {
                host,
                port,
                database_url,
                ephemeral,
            } => {
                if let Some(host) = host {
                    self.server.host = host.clone();
                }
                if let Some(port) = port {
                    self.server.port = *port;
                }
                if let Some(url) = database_url {
                    self.storage.database_url = Some(url.clone());
                }
                if *ephemeral {
                    self.storage.ephemeral = true;
                }
            }
            Commands::Chat { server } | Commands::Sessions { server, .. } => {
                if let Some(server) = server {
                    self.client.server_url = server.clone();
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.model.trim().is_empty() {
            return Err(ParleyError::Config("provider.model cannot be empty".to_string()).into());
        }

        if url::Url::parse(&self.provider.api_base).is_err() {
            return Err(ParleyError::Config(format!(
                "provider.api_base is not a valid URL: {}",
                self.provider.api_base
            ))
            .into());
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ParleyError::Config(
                "provider.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.provider.timeout_seconds == 0 {
            return Err(ParleyError::Config(
                "provider.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.rate_limit.max_requests == 0 {
            return Err(ParleyError::Config(
                "rate_limit.max_requests must be greater than 0".to_string(),
            )
            .into());
        }

        if self.rate_limit.window_seconds == 0 {
            return Err(ParleyError::Config(
                "rate_limit.window_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ParleyError::Config(
                "server.body_limit_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if url::Url::parse(&self.client.server_url).is_err() {
            return Err(ParleyError::Config(format!(
                "client.server_url is not a valid URL: {}",
                self.client.server_url
            ))
            .into());
        }

        Ok(())
    }
}
