//! Per-client request limiter
//!
//! One fixed window shared by the whole process, with a request count per
//! client address. When the window expires every count is reset at once.
//! Every API response gets
//! `RateLimit-Limit`, `RateLimit-Remaining` and `RateLimit-Reset` headers;
//! requests over the limit are answered with 429 before reaching a handler.

use crate::config::RateLimitConfig;
use crate::server::state::AppState;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Body returned to throttled clients
pub const TOO_MANY_REQUESTS_MESSAGE: &str =
    "Too many requests from this IP, please try again later.";

/// Outcome of one limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured ceiling
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

#[derive(Debug, Default)]
struct Window {
    /// Start of the current window; set by the first request
    started: Option<Instant>,
    counts: HashMap<String, u32>,
}

/// Fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    trust_forwarded_for: bool,
    state: Mutex<Window>,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Requests allowed per client per window
    /// * `window` - Window length, shared by every client
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trust_forwarded_for: false,
            state: Mutex::new(Window::default()),
        }
    }

    /// Build from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut limiter = Self::new(
            config.max_requests,
            Duration::from_secs(config.window_seconds),
        );
        limiter.trust_forwarded_for = config.trust_forwarded_for;
        limiter
    }

    /// Check and record a request from `key` now
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Check and record a request from `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        let current = state.started;
        let started = match current {
            Some(started) if now.duration_since(started) < self.window => started,
            _ => {
                state.counts.clear();
                state.started = Some(now);
                now
            }
        };
        let reset_after = self
            .window
            .saturating_sub(now.duration_since(started))
            .as_secs_f64()
            .ceil() as u64;

        let count = state.counts.entry(key.to_string()).or_insert(0);
        if *count >= self.max_requests {
            return RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after,
            };
        }

        *count += 1;
        RateDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - *count,
            reset_after,
        }
    }

    /// Identify the caller of a request
    ///
    /// Uses the first `X-Forwarded-For` hop when trusted, otherwise the peer
    /// address, and falls back to `"unknown"`.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_forwarded_for {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(hop) = forwarded {
                return hop.to_string();
            }
        }
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(decision.reset_after));
}

/// Middleware enforcing the limiter ahead of every route
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.limiter.client_key(request.headers(), peer);
    let decision = state.limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(client = %key, "Request rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": TOO_MANY_REQUESTS_MESSAGE })),
        )
            .into_response();
        apply_headers(response.headers_mut(), &decision);
        response.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            HeaderValue::from(decision.reset_after),
        );
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}
