use crate::config::StorageConfig;
use crate::error::{ParleyError, Result};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub mod memory;
pub mod types;
pub use memory::MemoryStorage;
pub use types::{Message, Role, Session, SessionSummary};

/// CRUD contract for session persistence
///
/// Implementations own their sessions exclusively. Every method is a single
/// store round trip; callers get no atomicity across calls.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Lists session summaries, most recently updated first
    ///
    /// Fails with a storage error if any stored record is unreadable, the
    /// same way [`SessionStore::get_session`] does for that record.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Fetches one session, failing with `SessionNotFound` if absent
    async fn get_session(&self, id: &str) -> Result<Session>;

    /// Creates a session with no messages
    async fn create_session(&self, id: &str, now: DateTime<Utc>) -> Result<Session>;

    /// Appends messages to a session, creating it if absent
    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
        now: DateTime<Utc>,
    ) -> Result<Session>;

    /// Deletes a session, failing with `SessionNotFound` if absent
    async fn delete_session(&self, id: &str) -> Result<()>;

    /// Releases the underlying connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens the store described by the storage configuration
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>> {
    if config.ephemeral {
        tracing::warn!("Using in-memory session storage; sessions will not survive a restart");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    let storage = match config.database_url.as_deref() {
        Some(url) => SqliteStorage::from_url(url)?,
        None => SqliteStorage::new()?,
    };
    Ok(Arc::new(storage))
}

fn storage_error(context: &str, e: impl std::fmt::Display) -> ParleyError {
    ParleyError::Storage(format!("{}: {}", context, e))
}

/// Fixed-width timestamps so lexical order in SQL matches time order
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| storage_error("Failed to parse stored timestamp", e))?
        .with_timezone(&Utc))
}

/// SQLite-backed session store
///
/// Each session is one row; its messages live in a JSON column, so a row is
/// the stored document.
pub struct SqliteStorage {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("dev", "parley", "parley")
            .ok_or_else(|| ParleyError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ParleyError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("sessions.db"))
    }

    /// Create a storage instance from a persistence connection string
    ///
    /// Accepts `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>` or a
    /// bare filesystem path.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::storage::SqliteStorage;
    ///
    /// let storage = SqliteStorage::from_url("sqlite::memory:").unwrap();
    /// assert!(storage.db_path().is_none());
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == "sqlite::memory:" || url == ":memory:" {
            return Self::in_memory();
        }
        if let Some(path) = url.strip_prefix("sqlite://") {
            return Self::new_with_path(path);
        }
        if let Some(path) = url.strip_prefix("sqlite:") {
            return Self::new_with_path(path);
        }
        if url.contains("://") {
            return Err(ParleyError::Config(format!(
                "Unsupported persistence connection string: {}",
                url
            ))
            .into());
        }
        Self::new_with_path(url)
    }

    /// Create a new storage instance that uses the specified database path.
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create parent directory for database")
                    .map_err(|e| ParleyError::Storage(e.to_string()))?;
            }
        }

        let conn =
            Connection::open(&db_path).map_err(|e| storage_error("Failed to open database", e))?;
        tracing::info!("Opened session database at {}", db_path.display());
        Self::with_connection(Some(db_path), conn)
    }

    /// Create a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| storage_error("Failed to open in-memory database", e))?;
        Self::with_connection(None, conn)
    }

    fn with_connection(db_path: Option<PathBuf>, conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Runs `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| ParleyError::Storage("Connection lock poisoned".into()))?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| ParleyError::Storage("Storage is closed".into()))?;
            f(conn)
        })
        .await
        .map_err(|e| storage_error("Storage task failed", e))?
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            messages JSON NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);",
    )
    .map_err(|e| storage_error("Failed to create tables", e))?;
    Ok(())
}

fn load_row(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let row = conn
        .query_row(
            "SELECT created_at, updated_at, messages FROM sessions WHERE session_id = ?",
            params![id],
            |row| {
                let created_at: String = row.get(0)?;
                let updated_at: String = row.get(1)?;
                let messages: String = row.get(2)?;
                Ok((created_at, updated_at, messages))
            },
        )
        .optional()
        .map_err(|e| storage_error("Failed to query session", e))?;

    match row {
        Some((created_at, updated_at, messages_json)) => {
            let messages: Vec<Message> = serde_json::from_str(&messages_json)
                .map_err(|e| storage_error("Failed to deserialize messages", e))?;
            Ok(Some(Session {
                session_id: id.to_string(),
                messages,
                created_at: decode_timestamp(&created_at)?,
                updated_at: decode_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, created_at, updated_at, messages
                    FROM sessions
                    ORDER BY updated_at DESC, session_id DESC",
                )
                .map_err(|e| storage_error("Failed to prepare statement", e))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(|e| storage_error("Failed to query sessions", e))?;

            let mut sessions = Vec::new();
            for row in rows {
                let (session_id, created_at, updated_at, messages_json) =
                    row.map_err(|e| storage_error("Failed to read session row", e))?;
                let messages: Vec<Message> = serde_json::from_str(&messages_json)
                    .map_err(|e| storage_error("Failed to deserialize messages", e))?;
                sessions.push(SessionSummary {
                    session_id,
                    created_at: decode_timestamp(&created_at)?,
                    updated_at: decode_timestamp(&updated_at)?,
                    message_count: messages.len(),
                    title: types::title_from_messages(&messages),
                });
            }
            Ok(sessions)
        })
        .await
    }

    async fn get_session(&self, id: &str) -> Result<Session> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            load_row(conn, &id)?.ok_or_else(|| ParleyError::SessionNotFound(id).into())
        })
        .await
    }

    async fn create_session(&self, id: &str, now: DateTime<Utc>) -> Result<Session> {
        let session = Session::new(id, now);
        let stored = session.clone();
        self.with_conn(move |conn| {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sessions WHERE session_id = ?",
                    params![stored.session_id],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|e| storage_error("Failed to query session", e))?
                .is_some();
            if exists {
                return Err(ParleyError::Storage(format!(
                    "Session already exists: {}",
                    stored.session_id
                ))
                .into());
            }

            conn.execute(
                "INSERT INTO sessions (session_id, created_at, updated_at, messages)
                VALUES (?, ?, ?, '[]')",
                params![
                    stored.session_id,
                    encode_timestamp(stored.created_at),
                    encode_timestamp(stored.updated_at)
                ],
            )
            .map_err(|e| storage_error("Failed to insert session", e))?;
            Ok(())
        })
        .await?;
        Ok(session)
    }

    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| storage_error("Failed to start transaction", e))?;

            let existing = load_row(&tx, &id)?;
            let is_new = existing.is_none();
            let mut session = existing.unwrap_or_else(|| Session::new(id.clone(), now));
            session.append(messages, now);

            let messages_json = serde_json::to_string(&session.messages)
                .map_err(|e| storage_error("Failed to serialize messages", e))?;

            if is_new {
                tracing::debug!("Creating session {} on first append", id);
                tx.execute(
                    "INSERT INTO sessions (session_id, created_at, updated_at, messages)
                    VALUES (?, ?, ?, ?)",
                    params![
                        id,
                        encode_timestamp(session.created_at),
                        encode_timestamp(session.updated_at),
                        messages_json
                    ],
                )
                .map_err(|e| storage_error("Failed to insert session", e))?;
            } else {
                tx.execute(
                    "UPDATE sessions SET updated_at = ?, messages = ? WHERE session_id = ?",
                    params![encode_timestamp(session.updated_at), messages_json, id],
                )
                .map_err(|e| storage_error("Failed to update session", e))?;
            }

            tx.commit()
                .map_err(|e| storage_error("Failed to commit transaction", e))?;
            Ok(session)
        })
        .await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn
                .execute("DELETE FROM sessions WHERE session_id = ?", params![id])
                .map_err(|e| storage_error("Failed to delete session", e))?;
            if removed == 0 {
                return Err(ParleyError::SessionNotFound(id).into());
            }
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| ParleyError::Storage("Connection lock poisoned".into()))?;
            if let Some(conn) = guard.take() {
                conn.close()
                    .map_err(|(_, e)| storage_error("Failed to close database", e))?;
                tracing::info!("Session database closed");
            }
            Ok(())
        })
        .await
        .map_err(|e| storage_error("Storage task failed", e))?
    }
}
