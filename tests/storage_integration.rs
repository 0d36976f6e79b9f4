mod common;

use chrono::{Duration, Utc};
use std::sync::Arc;

use common::create_temp_storage;
use parley::config::StorageConfig;
use parley::providers::fake::ScriptedProvider;
use parley::relay::ChatRelay;
use parley::storage::{open_store, Message, SessionStore, SqliteStorage};
use parley::ParleyError;

#[tokio::test]
async fn test_relay_over_sqlite_persists_across_reopen() {
    let (storage, tmp) = create_temp_storage();
    let db_path = tmp.path().join("sessions.db");

    let relay = ChatRelay::new(
        Arc::new(storage),
        Arc::new(ScriptedProvider::new().with_reply("Stored reply")),
        "system",
    );
    let session = relay.create_session().await.unwrap();
    relay
        .send_message(&session.session_id, "Remember me")
        .await
        .unwrap();
    relay.shutdown().await.unwrap();

    let reopened = SqliteStorage::new_with_path(&db_path).unwrap();
    let loaded = reopened.get_session(&session.session_id).await.unwrap();
    assert_eq!(loaded.messages.len(), 2);
    assert_eq!(loaded.messages[0].content, "Remember me");
    assert_eq!(loaded.messages[1].content, "Stored reply");
    assert_eq!(loaded.created_at, session.created_at);
}

#[tokio::test]
async fn test_listing_reflects_updates_and_deletes() {
    let (storage, _tmp) = create_temp_storage();
    let t0 = Utc::now();

    storage.create_session("a", t0).await.unwrap();
    storage
        .create_session("b", t0 + Duration::seconds(1))
        .await
        .unwrap();
    storage
        .append_messages(
            "a",
            vec![Message::user("first question", t0 + Duration::seconds(2))],
            t0 + Duration::seconds(2),
        )
        .await
        .unwrap();

    let listed = storage.list_sessions().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(listed[0].title.as_deref(), Some("first question"));
    assert_eq!(listed[1].message_count, 0);

    storage.delete_session("a").await.unwrap();
    let listed = storage.list_sessions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id, "b");

    let err = storage.delete_session("a").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ParleyError>(),
        Some(ParleyError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_open_store_from_database_url() {
    let tmp = tempfile::TempDir::new().unwrap();
    let url = format!("sqlite://{}", tmp.path().join("via-url.db").display());

    let store = open_store(&StorageConfig {
        database_url: Some(url),
        ephemeral: false,
    })
    .unwrap();
    store.create_session("x", Utc::now()).await.unwrap();
    assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    store.close().await.unwrap();

    assert!(tmp.path().join("via-url.db").exists());
}

#[tokio::test]
async fn test_open_store_ephemeral_ignores_database_url() {
    let store = open_store(&StorageConfig {
        database_url: Some("postgres://elsewhere/db".to_string()),
        ephemeral: true,
    })
    .unwrap();
    store.create_session("x", Utc::now()).await.unwrap();
    assert_eq!(store.get_session("x").await.unwrap().session_id, "x");
}

#[tokio::test]
async fn test_open_store_rejects_unknown_scheme() {
    let result = open_store(&StorageConfig {
        database_url: Some("mongodb://localhost/chat".to_string()),
        ephemeral: false,
    });
    let err = result.err().expect("unsupported scheme");
    assert!(matches!(
        err.downcast_ref::<ParleyError>(),
        Some(ParleyError::Config(_))
    ));
}
