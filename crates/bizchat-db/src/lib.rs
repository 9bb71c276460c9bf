//! Database layer for bizchat.
//!
//! Provides a unified `Database` struct that owns the SQLite connection
//! and provides access to domain-specific stores.

mod conversations;
mod model;
mod profiles;

pub use conversations::{AppendOutcome, Conversations};
pub use model::{
    BusinessProfile, CommunicationStyle, Conversation, ConversationFilter, ConversationStatus,
    ConversationSummary, CustomerInfo, Feedback, Industry, KnowledgeFocus, Message, MessageRole,
    Personality, UsageStats, DEFAULT_HOURS,
};
pub use profiles::Profiles;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors raised by the stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to encode column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Conversation not found: {chatbot_id}/{session_id}")]
    ConversationNotFound {
        chatbot_id: String,
        session_id: String,
    },
}

/// The main database struct that owns the SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the default location.
    ///
    /// The default location is `~/.local/share/bizchat/bizchat.db`.
    pub fn open() -> Result<Self, StoreError> {
        let db_path = Self::default_path();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        Self::open_at(&db_path)
    }

    /// Open or create a database at a specific path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the default database path.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bizchat")
            .join("bizchat.db")
    }

    /// Access the business profiles store.
    pub fn profiles(&self) -> Profiles<'_> {
        Profiles::new(self.lock())
    }

    /// Access the conversations store.
    pub fn conversations(&self) -> Conversations<'_> {
        Conversations::new(self.lock())
    }

    // Multi-statement writes run in transactions, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                industry TEXT NOT NULL,
                business_name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                hours TEXT NOT NULL,
                location TEXT,
                website TEXT,
                services TEXT NOT NULL DEFAULT '[]',
                features TEXT NOT NULL DEFAULT '[]',
                personality TEXT NOT NULL,
                communication_style TEXT NOT NULL,
                knowledge_focus TEXT NOT NULL,
                custom_prompt TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                total_conversations INTEGER NOT NULL DEFAULT 0,
                total_messages INTEGER NOT NULL DEFAULT 0,
                last_active_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                chatbot_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                session_id TEXT NOT NULL,
                status TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                customer_info TEXT NOT NULL DEFAULT '{}',
                tags TEXT NOT NULL DEFAULT '[]',
                feedback TEXT,
                created_at TEXT NOT NULL,
                last_activity_at TEXT NOT NULL,
                PRIMARY KEY (chatbot_id, session_id)
            );

            CREATE TABLE IF NOT EXISTS messages (
                chatbot_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (chatbot_id, session_id, seq),
                FOREIGN KEY (chatbot_id, session_id)
                    REFERENCES conversations(chatbot_id, session_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_owner ON profiles(owner_id);
            CREATE INDEX IF NOT EXISTS idx_conversations_activity
                ON conversations(chatbot_id, last_activity_at DESC);
            "#,
        )
    }
}

/// Timestamps are stored as fixed-width UTC RFC 3339 so that text order
/// matches time order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Decode a JSON text column, surfacing bad data as a conversion error.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
