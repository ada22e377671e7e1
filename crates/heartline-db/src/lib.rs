pub mod messages;
pub mod migrations;
pub mod models;
pub mod relationships;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer created a record for the same pair first.
    #[error("a relationship already exists for this pair")]
    DuplicateRelationship,

    /// The record changed between read and write.
    #[error("relationship was modified concurrently")]
    StaleRelationship,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("sender and receiver are not the two parties of this conversation")]
    InvalidParticipants,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Single-writer SQLite store. Every call holds the connection lock for its
/// whole duration, so each query (and each transaction) is atomic with
/// respect to other callers in this process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Like `with_conn`, for callers that open a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }
}

pub(crate) fn format_ts(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("uuid '{}': {}", raw, e)))
}
