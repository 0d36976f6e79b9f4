use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum characters of the first user message used as a session title
const TITLE_MAX_CHARS: usize = 60;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Written by the person chatting
    User,
    /// Generated by the provider
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message
    pub role: Role,
    /// Text content
    pub content: String,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a user message stamped with `timestamp`
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    /// Creates an assistant message stamped with `timestamp`
    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

/// A persisted conversation
///
/// Serializes to the stored document shape
/// `{sessionId, messages, createdAt, updatedAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier for the session
    pub session_id: String,
    /// Messages in conversation order
    pub messages: Vec<Message>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last updated
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends messages and moves `updated_at` forward
    ///
    /// `updated_at` always strictly increases, even when two writes share a
    /// clock reading.
    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>, now: DateTime<Utc>) {
        self.messages.extend(messages);
        let floor = self.updated_at + chrono::Duration::microseconds(1);
        self.updated_at = if now > self.updated_at { now } else { floor };
    }

    /// List projection of this session
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
            title: title_from_messages(&self.messages),
        }
    }
}

/// Metadata for a stored session, as returned by the list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Unique identifier for the session
    pub session_id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last updated
    pub updated_at: DateTime<Utc>,
    /// Number of messages in the session
    #[serde(default)]
    pub message_count: usize,
    /// First user message, shortened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Derives a short title from the first user message
pub fn title_from_messages(messages: &[Message]) -> Option<String> {
    let first = messages.iter().find(|m| m.role == Role::User)?;
    let text = first.content.trim();
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS - 3).collect();
        Some(format!("{}...", head.trim_end()))
    } else {
        Some(text.to_string())
    }
}
