//! Database module for Inbox Rules
//!
//! SQLite storage for the local message snapshot the rule engine runs over.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

// Connection pooling
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

const MESSAGE_COLUMNS: &str =
    "id, thread_id, sender, recipients, subject, date, snippet, label_ids, body";

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database manager for thread-safe SQLite access
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Database {
    /// Open (or create) the snapshot database at `db_path`
    pub fn new(db_path: PathBuf) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(&db_path);

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(10))
            .build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;
        Self::init_schema(&conn)?;
        drop(conn);

        log::debug!("Snapshot database opened at {:?}", db_path);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create an in-memory database (for testing)
    ///
    /// Every pooled connection to `:memory:` is a separate database, so the
    /// pool is capped at a single connection.
    pub fn in_memory() -> DbResult<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder().max_size(1).build(manager)?;

        let conn = pool.get()?;
        Self::init_schema(&conn)?;
        drop(conn);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn init_schema(conn: &Connection) -> DbResult<()> {
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Get a connection from the pool
    #[inline]
    pub fn get_conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Store a message unless one with the same id is already present.
    ///
    /// Returns `true` when the row was inserted, `false` for a duplicate.
    pub fn insert_message(&self, message: &Message) -> DbResult<bool> {
        if message.id.is_empty() {
            return Err(DbError::Constraint("message id must not be empty".to_string()));
        }

        let conn = self.get_conn()?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO emails
            (id, thread_id, sender, recipients, subject, date, snippet, label_ids, body)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                message.id,
                message.thread_id,
                message.sender,
                message.recipients,
                message.subject,
                message.date,
                message.snippet,
                message.label_ids.join(","),
                message.body,
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Check whether a message id is already in the snapshot
    pub fn has_message(&self, id: &str) -> DbResult<bool> {
        let conn = self.get_conn()?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM emails WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    /// Get one message by id
    pub fn get_message(&self, id: &str) -> DbResult<Message> {
        let conn = self.get_conn()?;

        conn.query_row(
            &format!("SELECT {} FROM emails WHERE id = ?1", MESSAGE_COLUMNS),
            [id],
            Message::from_row,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("message {}", id)))
    }

    /// Get the whole snapshot in insertion order
    pub fn get_messages(&self) -> DbResult<Vec<Message>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM emails ORDER BY rowid ASC",
            MESSAGE_COLUMNS
        ))?;

        let messages = stmt
            .query_map([], Message::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    /// Number of messages in the snapshot
    #[cfg(test)]
    pub fn message_count(&self) -> DbResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Snapshot message record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub sender: String,
    pub recipients: String,
    pub subject: String,
    /// Raw `Date` header value, parsed lazily by date conditions
    pub date: String,
    pub snippet: String,
    pub label_ids: Vec<String>,
    /// Plain-text body, empty when the message has no text/plain part
    pub body: String,
}

impl Message {
    /// Create Message from database row
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let label_ids: String = row.get(7)?;

        Ok(Message {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            sender: row.get(2)?,
            recipients: row.get(3)?,
            subject: row.get(4)?,
            date: row.get(5)?,
            snippet: row.get(6)?,
            label_ids: split_label_ids(&label_ids),
            body: row.get(8)?,
        })
    }

    /// Record attributes that are not first-class condition fields
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.clone()),
            "thread_id" | "threadid" => Some(self.thread_id.clone()),
            "snippet" => Some(self.snippet.clone()),
            "labels" | "label_ids" | "labelids" => Some(self.label_ids.join(",")),
            "date" => Some(self.date.clone()),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_ids.iter().any(|id| id == label_id)
    }
}

/// Parse the comma-joined label column into an ordered set
pub fn split_label_ids(raw: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !labels.iter().any(|existing| existing == id) {
            labels.push(id.to_string());
        }
    }
    labels
}
