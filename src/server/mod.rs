//! HTTP surface for Parley
//!
//! Exposes session CRUD and message relay under `/api`, behind CORS, a body
//! size limit, request tracing and the per-client limiter.

pub mod rate_limit;
pub mod routes;
pub mod state;

pub use rate_limit::RateLimiter;
pub use state::AppState;

use crate::config::ServerConfig;
use crate::error::{ParleyError, Result};

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the cross-origin policy from the configured origins
///
/// # Errors
///
/// Returns a configuration error if an origin is not a valid header value
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let parsed = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| {
                ParleyError::Config(format!("Invalid CORS origin: {}", origin))
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(layer.allow_origin(parsed))
}

/// Build the application router
///
/// # Errors
///
/// Returns error if the CORS configuration is invalid
pub fn build_router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let api = Router::new()
        .route("/chats", get(routes::list_chats).post(routes::create_chat))
        .route(
            "/chats/:id",
            get(routes::get_chat).delete(routes::delete_chat),
        )
        .route("/chats/:id/message", post(routes::send_message))
        .route("/health", get(routes::health))
        .route("/test-groq", get(routes::test_provider))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ));

    Ok(Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind and serve until Ctrl-C or SIGTERM
///
/// # Errors
///
/// Returns error if the address is invalid or the listener cannot bind
pub async fn serve(router: Router, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ParleyError::Config(format!("Invalid listen address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server terminated unexpectedly")?;

    tracing::info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
