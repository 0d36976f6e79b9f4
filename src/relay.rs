//! Conversation relay
//!
//! [`ChatRelay`] ties the session store to the generation provider. It owns
//! the only write path for message exchanges and serializes those writes per
//! session, so concurrent posts to one session append complete
//! `user, assistant` pairs in lock order.

use crate::error::{ParleyError, Result};
use crate::providers::{ChatMessage, Completion, Provider};
use crate::storage::{Message, Session, SessionStore, SessionSummary};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use ulid::Ulid;

/// Prompt used by [`ChatRelay::probe`]
const PROBE_PROMPT: &str = "Reply with a short greeting to confirm you are reachable.";

/// Result of a successful message post
#[derive(Debug, Clone)]
pub struct Exchange {
    /// The session after the reply was appended
    pub session: Session,
    /// The stored user turn
    pub user_message: Message,
    /// The stored assistant turn
    pub assistant_message: Message,
    /// Model that produced the reply
    pub model: String,
}

/// Per-session async locks
///
/// Entries are weak so the map only holds sessions with a live holder or
/// waiter.
#[derive(Debug, Default)]
struct SessionLocks {
    inner: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl SessionLocks {
    fn handle(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = map.get(id).and_then(Weak::upgrade) {
            return existing;
        }
        map.retain(|_, lock| lock.strong_count() > 0);
        let fresh = Arc::new(AsyncMutex::new(()));
        map.insert(id.to_string(), Arc::downgrade(&fresh));
        fresh
    }

    async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        self.handle(id).lock_owned().await
    }

    fn tracked(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.values().filter(|lock| lock.strong_count() > 0).count()
    }
}

/// Session CRUD plus message relay
pub struct ChatRelay {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn Provider>,
    system_prompt: Option<String>,
    locks: SessionLocks,
}

impl ChatRelay {
    /// Creates a relay; an empty `system_prompt` sends no system message
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn Provider>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            store,
            provider,
            system_prompt: (!system_prompt.trim().is_empty()).then_some(system_prompt),
            locks: SessionLocks::default(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Model identifier of the provider
    pub fn model(&self) -> String {
        self.provider.model()
    }

    /// Lists sessions, most recently updated first
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.store.list_sessions().await
    }

    /// Fetches one session
    pub async fn get_session(&self, id: &str) -> Result<Session> {
        self.store.get_session(id).await
    }

    /// Creates an empty session under a fresh ULID
    pub async fn create_session(&self) -> Result<Session> {
        let id = Ulid::new().to_string();
        let session = self.store.create_session(&id, Utc::now()).await?;
        tracing::info!(session_id = %id, "Session created");
        Ok(session)
    }

    /// Deletes a session, waiting for any in-flight exchange on it
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let _guard = self.locks.lock(id).await;
        self.store.delete_session(id).await?;
        tracing::info!(session_id = %id, "Session deleted");
        Ok(())
    }

    /// Builds the provider context: system prompt, then stored history
    pub fn build_context(&self, history: &[Message]) -> Vec<ChatMessage> {
        let mut context = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            context.push(ChatMessage::system(prompt.clone()));
        }
        context.extend(history.iter().map(ChatMessage::from));
        context
    }

    /// Posts a user message and relays the conversation to the provider
    ///
    /// The user turn is stored before the provider call. If the call fails
    /// the turn stays stored without a reply and the error is returned as
    /// [`ParleyError::RelayFailed`].
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` for empty or whitespace-only text; nothing is stored
    /// - storage errors from either append
    /// - `RelayFailed` wrapping the classified provider error
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Exchange> {
        if text.trim().is_empty() {
            return Err(ParleyError::EmptyMessage.into());
        }

        let _guard = self.locks.lock(session_id).await;

        let sent_at = Utc::now();
        let user_message = Message::user(text, sent_at);
        let session = self
            .store
            .append_messages(session_id, vec![user_message.clone()], sent_at)
            .await?;

        let context = self.build_context(&session.messages);
        tracing::debug!(
            session_id = %session_id,
            context_len = context.len(),
            "Relaying conversation to provider"
        );

        let completion: Completion = match self.provider.complete(&context).await {
            Ok(completion) => completion,
            Err(err) => {
                let source = match err.downcast::<ParleyError>() {
                    Ok(classified) => classified,
                    Err(other) => ParleyError::Provider(other.to_string()),
                };
                tracing::warn!(
                    session_id = %session_id,
                    error = %source,
                    "Provider call failed; user message persisted without a reply"
                );
                return Err(ParleyError::RelayFailed {
                    session_id: session_id.to_string(),
                    user_message_persisted: true,
                    source: Box::new(source),
                }
                .into());
            }
        };

        let replied_at = Utc::now();
        let assistant_message = Message::assistant(completion.content, replied_at);
        let session = self
            .store
            .append_messages(session_id, vec![assistant_message.clone()], replied_at)
            .await?;

        tracing::info!(
            session_id = %session_id,
            messages = session.messages.len(),
            "Exchange stored"
        );

        Ok(Exchange {
            session,
            user_message,
            assistant_message,
            model: completion.model,
        })
    }

    /// Sends a fixed prompt to the provider without touching the store
    pub async fn probe(&self) -> Result<Completion> {
        let mut context = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            context.push(ChatMessage::system(prompt.clone()));
        }
        context.push(ChatMessage::user(PROBE_PROMPT));
        self.provider.complete(&context).await
    }

    /// Closes the store
    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::ScriptedProvider;
    use crate::storage::{MemoryStorage, Role};
    use std::time::Duration;

    fn relay_with(provider: Arc<ScriptedProvider>) -> (ChatRelay, Arc<MemoryStorage>) {
        let store = Arc::new(MemoryStorage::new());
        let relay = ChatRelay::new(store.clone(), provider, "You are a test assistant.");
        (relay, store)
    }

    #[tokio::test]
    async fn test_empty_message_touches_nothing() {
        let provider = Arc::new(ScriptedProvider::new());
        let (relay, store) = relay_with(provider.clone());
        let session = relay.create_session().await.unwrap();

        for text in ["", "   ", "\n\t"] {
            let err = relay
                .send_message(&session.session_id, text)
                .await
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ParleyError>(),
                Some(ParleyError::EmptyMessage)
            ));
        }

        assert_eq!(provider.call_count(), 0);
        let stored = store.get_session(&session.session_id).await.unwrap();
        assert!(stored.messages.is_empty());
    }

    #[tokio::test]
    async fn test_successful_post_appends_pair_and_advances_updated_at() {
        let provider = Arc::new(ScriptedProvider::new().with_reply("Hello!"));
        let (relay, _store) = relay_with(provider);
        let session = relay.create_session().await.unwrap();

        let exchange = relay
            .send_message(&session.session_id, "Hi")
            .await
            .unwrap();

        assert_eq!(exchange.session.messages.len(), 2);
        assert_eq!(exchange.session.messages[0].role, Role::User);
        assert_eq!(exchange.session.messages[1].role, Role::Assistant);
        assert_eq!(exchange.assistant_message.content, "Hello!");
        assert!(exchange.session.updated_at > session.updated_at);
    }

    #[tokio::test]
    async fn test_second_post_sees_first_exchange() {
        let provider = Arc::new(ScriptedProvider::new().with_reply("A1").with_reply("A2"));
        let (relay, _store) = relay_with(provider.clone());
        let session = relay.create_session().await.unwrap();

        relay.send_message(&session.session_id, "Q1").await.unwrap();
        relay.send_message(&session.session_id, "Q2").await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            vec![
                ChatMessage::system("You are a test assistant."),
                ChatMessage::user("Q1"),
                ChatMessage::assistant("A1"),
                ChatMessage::user("Q2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_user_turn_only() {
        let provider = Arc::new(
            ScriptedProvider::new().with_error(ParleyError::ProviderRateLimited {
                message: "Please try again in 30s".into(),
                retry_after: Some(30),
            }),
        );
        let (relay, store) = relay_with(provider);
        let session = relay.create_session().await.unwrap();

        let err = relay
            .send_message(&session.session_id, "Hi")
            .await
            .unwrap_err();
        match err.downcast_ref::<ParleyError>() {
            Some(ParleyError::RelayFailed {
                user_message_persisted,
                source,
                ..
            }) => {
                assert!(*user_message_persisted);
                assert!(matches!(
                    **source,
                    ParleyError::ProviderRateLimited {
                        retry_after: Some(30),
                        ..
                    }
                ));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let stored = store.get_session(&session.session_id).await.unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_post_to_unknown_session_creates_it() {
        let provider = Arc::new(ScriptedProvider::new());
        let (relay, store) = relay_with(provider);
        relay.send_message("adhoc", "hello").await.unwrap();
        let stored = store.get_session("adhoc").await.unwrap();
        assert_eq!(stored.messages[1].content, "echo: hello");
    }

    #[tokio::test]
    async fn test_concurrent_posts_to_one_session_are_serialized() {
        let provider =
            Arc::new(ScriptedProvider::new().with_delay(Duration::from_millis(20)));
        let (relay, store) = relay_with(provider.clone());
        let relay = Arc::new(relay);
        let session = relay.create_session().await.unwrap();

        let a = {
            let relay = relay.clone();
            let id = session.session_id.clone();
            tokio::spawn(async move { relay.send_message(&id, "one").await })
        };
        let b = {
            let relay = relay.clone();
            let id = session.session_id.clone();
            tokio::spawn(async move { relay.send_message(&id, "two").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let stored = store.get_session(&session.session_id).await.unwrap();
        assert_eq!(stored.messages.len(), 4);
        for pair in stored.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
        }
        // The later call saw the earlier exchange.
        let calls = provider.calls();
        assert_eq!(calls[1].len(), 4);
    }

    #[tokio::test]
    async fn test_empty_system_prompt_is_omitted() {
        let store = Arc::new(MemoryStorage::new());
        let relay = ChatRelay::new(store, Arc::new(ScriptedProvider::new()), "  ");
        let now = Utc::now();
        let context = relay.build_context(&[Message::user("x", now)]);
        assert_eq!(context, vec![ChatMessage::user("x")]);
    }

    #[tokio::test]
    async fn test_probe_does_not_store_anything() {
        let provider = Arc::new(ScriptedProvider::new().with_reply("hey"));
        let (relay, store) = relay_with(provider);
        let completion = relay.probe().await.unwrap();
        assert_eq!(completion.content, "hey");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_session_locks_are_released() {
        let provider = Arc::new(ScriptedProvider::new());
        let (relay, _store) = relay_with(provider);
        relay.send_message("s", "hi").await.unwrap();
        assert_eq!(relay.locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_session_is_not_found() {
        let (relay, _store) = relay_with(Arc::new(ScriptedProvider::new()));
        let err = relay.delete_session("missing").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParleyError>(),
            Some(ParleyError::SessionNotFound(_))
        ));
    }
}
