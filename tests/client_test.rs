mod common;

use serde_json::json;
use std::net::SocketAddr;

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::client::state::SendOutcome;
use parley::client::{ApiClient, ClientState};
use parley::providers::fake::ScriptedProvider;
use parley::storage::Role;
use parley::ParleyError;

fn session_summary(id: &str, count: usize) -> serde_json::Value {
    json!({
        "sessionId": id,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:05Z",
        "messageCount": count,
        "title": null
    })
}

#[tokio::test]
async fn test_rate_limited_send_starts_countdown_of_hinted_seconds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chats/s1/message"))
        .and(body_json(json!({"message": "Hi"})))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": "Rate limit exceeded. Please wait 30 seconds before trying again."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chats/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "s1",
            "messages": [{"role": "user", "content": "Hi", "timestamp": "2026-01-01T00:00:05Z"}],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:05Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_summary("s1", 1)])))
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri()).unwrap();
    let mut state = ClientState::new();
    state.active_session = Some("s1".to_string());

    let outcome = state.send(&api, "Hi").await;
    assert_eq!(outcome, SendOutcome::Failed);
    assert!(!state.in_flight);

    let banner = state.error.clone().expect("error banner set");
    assert!(banner.message.contains("Please wait 30 seconds"));
    assert_eq!(state.countdown_remaining(), Some(30));

    // The thread shows what the server kept: the lone user turn
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].role, Role::User);
    assert_eq!(state.sessions.len(), 1);

    // Sending is refused while the countdown runs
    assert_eq!(
        state.send(&api, "again").await,
        SendOutcome::Blocked { remaining: 30 }
    );

    for _ in 0..29 {
        state.tick();
    }
    assert_eq!(state.countdown_remaining(), Some(1));
    assert_eq!(state.tick(), Some(0));
    assert_eq!(state.countdown_remaining(), None);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_create_and_delete_refetch_session_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sessionId": "s9",
            "createdAt": "2026-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chats/s9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "sessionId": "s9"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_summary("s9", 0)])))
        .expect(2)
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri()).unwrap();
    let mut state = ClientState::new();

    let id = state.create_session(&api).await.unwrap();
    assert_eq!(id, "s9");
    assert_eq!(state.active_session.as_deref(), Some("s9"));
    assert_eq!(state.sessions[0].session_id, "s9");

    state.delete_session(&api, "s9").await.unwrap();
    assert!(state.active_session.is_none());
    assert!(state.messages.is_empty());
}

#[tokio::test]
async fn test_not_found_sets_banner_without_countdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Chat session not found"})),
        )
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri()).unwrap();
    let mut state = ClientState::new();
    let err = state.open_session(&api, "missing").await.unwrap_err();

    assert_eq!(err.status, Some(404));
    assert_eq!(err.message, "Chat session not found");
    let banner = state.error.expect("banner set");
    assert!(banner.countdown.is_none());
}

#[tokio::test]
async fn test_unreachable_server_reports_transport_error() {
    let server = MockServer::builder().start().await;
    let api = ApiClient::new(&server.uri()).unwrap();
    drop(server);

    let err = api.list_sessions().await.unwrap_err();
    assert_eq!(err.status, None);
    assert!(err.message.starts_with("Could not reach server"));
}

async fn spawn_server(provider: ScriptedProvider) -> String {
    let app = common::test_app(provider);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_client_against_running_server() {
    let base = spawn_server(ScriptedProvider::new().with_reply("Hello!")).await;
    let api = ApiClient::new(&base).unwrap();
    let mut state = ClientState::new();

    assert_eq!(api.health().await.unwrap()["status"], "OK");

    // No active session: sending creates one first
    match state.send(&api, "Hi").await {
        SendOutcome::Replied(reply) => assert_eq!(reply.content, "Hello!"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let id = state.active_session.clone().expect("session created");
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.sessions[0].message_count, 2);

    let session = api.get_session(&id).await.unwrap();
    assert_eq!(session.messages, state.messages);

    assert_eq!(state.send(&api, "   ").await, SendOutcome::Empty);

    let probe = api.probe().await.unwrap();
    assert!(probe.success);
    assert_eq!(probe.model, "scripted-model");
}

#[tokio::test]
async fn test_client_sees_server_rate_limit_countdown() {
    let base = spawn_server(ScriptedProvider::new().with_error(
        ParleyError::ProviderRateLimited {
            message: "Please try again in 30s".into(),
            retry_after: Some(30),
        },
    ))
    .await;
    let api = ApiClient::new(&base).unwrap();
    let mut state = ClientState::new();

    assert_eq!(state.send(&api, "Hi").await, SendOutcome::Failed);
    assert_eq!(state.countdown_remaining(), Some(30));
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn test_delete_with_reserved_characters_stays_on_that_session() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/chats/victim"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "sessionId": "victim"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri()).unwrap();
    let err = api.delete_session("victim?typo").await.unwrap_err();
    assert_eq!(err.status, Some(404));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/api/chats/victim%3Ftypo");
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_server_sees_reserved_characters_in_session_id() {
    let base = spawn_server(ScriptedProvider::new().with_reply("Noted")).await;
    let api = ApiClient::new(&base).unwrap();

    let sent = api.send_message("odd?id#1", "Hi").await.unwrap();
    assert_eq!(sent.session_id, "odd?id#1");

    let session = api.get_session("odd?id#1").await.unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(api.get_session("odd").await.unwrap_err().status, Some(404));

    let deleted = api.delete_session("odd?id#1").await.unwrap();
    assert_eq!(deleted.session_id, "odd?id#1");
    assert!(api.list_sessions().await.unwrap().is_empty());
}
