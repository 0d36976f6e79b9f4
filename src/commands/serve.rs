//! `parley serve`
//!
//! Builds the store, provider and relay, serves until a shutdown signal,
//! then closes the store.

use crate::config::Config;
use crate::error::Result;
use crate::providers::create_provider;
use crate::relay::ChatRelay;
use crate::server::{self, AppState, RateLimiter};
use crate::storage::open_store;
use std::sync::Arc;

/// Run the HTTP server
///
/// # Errors
///
/// Returns error if the store or provider cannot be initialized, or the
/// listener cannot bind
pub async fn run_server(config: Config) -> Result<()> {
    tracing::info!("Starting Parley server");

    let store = open_store(&config.storage)?;
    let provider = create_provider(&config.provider)?;
    let relay = Arc::new(ChatRelay::new(
        store,
        provider,
        config.provider.system_prompt.clone(),
    ));

    let state = AppState::new(relay.clone(), RateLimiter::from_config(&config.rate_limit));
    let router = server::build_router(state, &config.server)?;

    let served = server::serve(router, &config.server).await;

    if let Err(e) = relay.shutdown().await {
        tracing::warn!("Failed to close session store: {}", e);
    }
    served
}
