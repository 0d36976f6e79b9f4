//! Client view model
//!
//! Holds what the chat screen shows: the session list, the active session and
//! its messages, an in-flight flag, and the current error banner. Every
//! create, delete and send refetches the session list so it mirrors the
//! server.

use super::{ApiClient, ClientError};
use crate::storage::{Message, SessionSummary};

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;

fn wait_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*(?:seconds?|secs?|s)\b").expect("countdown pattern is valid")
    })
}

/// Local wait timer parsed from a rate-limit error
///
/// Purely cosmetic: it is not coordinated with the server's limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
}

impl Countdown {
    /// Countdown of `seconds`
    pub fn new(seconds: u64) -> Self {
        Self { remaining: seconds }
    }

    /// Extract the first wait hint from error text
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::client::Countdown;
    ///
    /// let countdown = Countdown::parse("Please wait 30 seconds before trying again.").unwrap();
    /// assert_eq!(countdown.remaining(), 30);
    /// assert!(Countdown::parse("Chat session not found").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        wait_pattern()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .map(Self::new)
    }

    /// Seconds left
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Advance by one second, saturating at zero
    pub fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Whether the wait is over
    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

/// Error shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    /// Text from the server or transport
    pub message: String,
    /// Wait timer when the text carried a hint
    pub countdown: Option<Countdown>,
}

impl ErrorBanner {
    /// Build a banner, parsing a countdown out of rate-limit text
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        let message = message.into();
        let countdown = if status == Some(429) {
            Countdown::parse(&message)
        } else {
            None
        };
        Self { message, countdown }
    }
}

impl From<&ClientError> for ErrorBanner {
    fn from(err: &ClientError) -> Self {
        Self::new(err.message.clone(), err.status)
    }
}

/// Result of [`ClientState::send`]
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The reply arrived and was appended
    Replied(Message),
    /// Nothing to send
    Empty,
    /// A countdown is still running
    Blocked {
        /// Seconds left on the countdown
        remaining: u64,
    },
    /// The request failed; see [`ClientState::error`]
    Failed,
}

/// Chat screen state
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    /// Sessions as last fetched, most recently updated first
    pub sessions: Vec<SessionSummary>,
    /// Currently open session
    pub active_session: Option<String>,
    /// Messages of the open session
    pub messages: Vec<Message>,
    /// A send is awaiting its reply
    pub in_flight: bool,
    /// Current error, if any
    pub error: Option<ErrorBanner>,
}

impl ClientState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    fn record_error(&mut self, err: &ClientError) {
        tracing::debug!(status = ?err.status, message = %err.message, "Client error");
        self.error = Some(ErrorBanner::from(err));
    }

    /// Remaining countdown seconds, if one is running
    pub fn countdown_remaining(&self) -> Option<u64> {
        self.error
            .as_ref()
            .and_then(|banner| banner.countdown)
            .filter(|countdown| !countdown.is_finished())
            .map(|countdown| countdown.remaining())
    }

    /// Advance the countdown by one second; clears the banner when it ends
    ///
    /// Returns the seconds left after the tick.
    pub fn tick(&mut self) -> Option<u64> {
        let banner = self.error.as_mut()?;
        let countdown = banner.countdown.as_mut()?;
        countdown.tick();
        let remaining = countdown.remaining();
        if countdown.is_finished() {
            self.error = None;
        }
        Some(remaining)
    }

    /// Refetch the session list
    pub async fn refresh_sessions(&mut self, api: &ApiClient) -> Result<(), ClientError> {
        match api.list_sessions().await {
            Ok(sessions) => {
                self.sessions = sessions;
                Ok(())
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    /// Create a session and make it active
    pub async fn create_session(&mut self, api: &ApiClient) -> Result<String, ClientError> {
        let created = match api.create_session().await {
            Ok(created) => created,
            Err(err) => {
                self.record_error(&err);
                return Err(err);
            }
        };
        self.active_session = Some(created.session_id.clone());
        self.messages.clear();
        self.error = None;
        self.refresh_sessions(api).await?;
        Ok(created.session_id)
    }

    /// Load a session and make it active
    pub async fn open_session(&mut self, api: &ApiClient, id: &str) -> Result<(), ClientError> {
        match api.get_session(id).await {
            Ok(session) => {
                self.active_session = Some(session.session_id);
                self.messages = session.messages;
                self.error = None;
                Ok(())
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    /// Delete a session; closes it if it was active
    pub async fn delete_session(&mut self, api: &ApiClient, id: &str) -> Result<(), ClientError> {
        if let Err(err) = api.delete_session(id).await {
            self.record_error(&err);
            return Err(err);
        }
        if self.active_session.as_deref() == Some(id) {
            self.active_session = None;
            self.messages.clear();
        }
        self.refresh_sessions(api).await
    }

    /// Send a message on the active session, creating one if needed
    ///
    /// The user turn is shown immediately. On failure the open session is
    /// reloaded so the thread matches what the server kept.
    pub async fn send(&mut self, api: &ApiClient, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Empty;
        }
        if let Some(remaining) = self.countdown_remaining() {
            return SendOutcome::Blocked { remaining };
        }

        let session_id = match &self.active_session {
            Some(id) => id.clone(),
            None => match self.create_session(api).await {
                Ok(id) => id,
                Err(_) => return SendOutcome::Failed,
            },
        };

        self.error = None;
        self.messages.push(Message::user(text, Utc::now()));
        self.in_flight = true;
        let result = api.send_message(&session_id, text).await;
        self.in_flight = false;

        let outcome = match result {
            Ok(reply) => {
                self.messages.pop();
                self.messages.push(reply.user_message);
                self.messages.push(reply.assistant_message.clone());
                SendOutcome::Replied(reply.assistant_message)
            }
            Err(err) => {
                self.record_error(&err);
                if let Ok(session) = api.get_session(&session_id).await {
                    self.messages = session.messages;
                }
                SendOutcome::Failed
            }
        };

        // Keep the current banner if the list refresh also fails
        if let Ok(sessions) = api.list_sessions().await {
            self.sessions = sessions;
        }
        outcome
    }
}
