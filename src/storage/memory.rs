//! In-process session store
//!
//! Keeps sessions in a map behind an async lock. Used for `--ephemeral`
//! servers and as the store in router tests.

use super::{Message, Session, SessionStore, SessionSummary};
use crate::error::{ParleyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Thread-safe in-memory session store
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStorage {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStorage {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(Session::summary).collect();
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.session_id.cmp(&a.session_id))
        });
        Ok(summaries)
    }

    async fn get_session(&self, id: &str) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ParleyError::SessionNotFound(id.to_string()).into())
    }

    async fn create_session(&self, id: &str, now: DateTime<Utc>) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(ParleyError::Storage(format!("Session already exists: {}", id)).into());
        }
        let session = Session::new(id, now);
        sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id, now));
        session.append(messages, now);
        Ok(session.clone())
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        match self.sessions.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(ParleyError::SessionNotFound(id.to_string()).into()),
        }
    }
}
