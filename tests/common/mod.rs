use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use parley::config::ServerConfig;
use parley::providers::fake::ScriptedProvider;
use parley::relay::ChatRelay;
use parley::server::{build_router, AppState, RateLimiter};
use parley::storage::{MemoryStorage, SqliteStorage};

pub const TEST_SYSTEM_PROMPT: &str = "You are a test assistant.";

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Router over in-memory storage and a scripted provider
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStorage>,
    pub provider: Arc<ScriptedProvider>,
}

#[allow(dead_code)]
pub fn test_app(provider: ScriptedProvider) -> TestApp {
    test_app_with_limit(provider, 100, Duration::from_secs(900))
}

#[allow(dead_code)]
pub fn test_app_with_limit(provider: ScriptedProvider, max: u32, window: Duration) -> TestApp {
    let store = Arc::new(MemoryStorage::new());
    let provider = Arc::new(provider);
    let relay = Arc::new(ChatRelay::new(
        store.clone(),
        provider.clone(),
        TEST_SYSTEM_PROMPT,
    ));
    let state = AppState::new(relay, RateLimiter::new(max, window));
    let router = build_router(state, &ServerConfig::default()).expect("router builds");
    TestApp {
        router,
        store,
        provider,
    }
}

/// Response parts with the body decoded as JSON (`Null` for empty bodies)
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

#[allow(dead_code)]
pub async fn call(router: &Router, request: Request<Body>) -> TestResponse {
    call_from(router, request, "127.0.0.1:40000").await
}

#[allow(dead_code)]
pub async fn call_from(router: &Router, mut request: Request<Body>, peer: &str) -> TestResponse {
    let addr: SocketAddr = peer.parse().expect("valid peer address");
    request.extensions_mut().insert(ConnectInfo(addr));

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[allow(dead_code)]
pub fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).expect("request")
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[allow(dead_code)]
pub fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}
