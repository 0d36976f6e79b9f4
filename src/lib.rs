//! Parley - chat relay server and terminal client library
//!
//! This library persists chat sessions, relays each conversation to an
//! OpenAI-compatible chat completion API (Groq by default), and serves both
//! behind a rate-limited HTTP API. A terminal client talks to that API.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: Session store trait with SQLite and in-memory backends
//! - `providers`: Generation provider abstraction and the Groq implementation
//! - `relay`: Session CRUD plus the message exchange
//! - `server`: axum router, handlers and the per-client limiter
//! - `client`: HTTP client and chat view model
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use parley::providers::create_provider;
//! use parley::storage::open_store;
//! use parley::{ChatRelay, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let relay = ChatRelay::new(
//!         open_store(&config.storage)?,
//!         create_provider(&config.provider)?,
//!         config.provider.system_prompt.clone(),
//!     );
//!     let session = relay.create_session().await?;
//!     let exchange = relay.send_message(&session.session_id, "Hello!").await?;
//!     println!("{}", exchange.assistant_message.content);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod relay;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{ParleyError, Result};
pub use relay::{ChatRelay, Exchange};
pub use storage::{Message, Role, Session, SessionStore, SessionSummary};
