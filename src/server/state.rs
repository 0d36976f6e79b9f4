//! Shared state handed to every route

use crate::relay::ChatRelay;
use crate::server::rate_limit::RateLimiter;
use std::sync::Arc;

/// Router state
#[derive(Clone)]
pub struct AppState {
    /// Session and relay operations
    pub relay: Arc<ChatRelay>,
    /// Per-client limiter
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new state
    pub fn new(relay: Arc<ChatRelay>, limiter: RateLimiter) -> Self {
        Self {
            relay,
            limiter: Arc::new(limiter),
        }
    }
}
