//! Record store: persisted billing records and the queries the aggregation
//! job runs over them
//!
//! Table written/read: `billing_records`
//! - INSERT by the consumer after a record decodes
//! - full scan in id order by the aggregation job (`fetch_all` or the
//!   description-only `query_descriptions`)

use crate::record::Record;
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum FetchError {
    Database(rusqlite::Error),
    InvalidRow(String),
    Unavailable(String),
}

impl From<rusqlite::Error> for FetchError {
    fn from(err: rusqlite::Error) -> Self {
        FetchError::Database(err)
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Database(e) => write!(f, "Database error: {}", e),
            FetchError::InvalidRow(msg) => write!(f, "Invalid row: {}", msg),
            FetchError::Unavailable(msg) => write!(f, "Record store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Table store holding billing records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record, in insertion order
    async fn fetch_all(&self) -> Result<Vec<Record>, FetchError>;

    /// Only the description column, in insertion order
    async fn query_descriptions(&self) -> Result<Vec<String>, FetchError>;

    /// Persist one record
    async fn insert(&self, record: &Record) -> Result<(), FetchError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// SQLite implementation of RecordStore
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the store and ensure the schema exists
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, FetchError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FetchError::Unavailable(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS billing_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                service TEXT NOT NULL,
                description TEXT NOT NULL,
                cost REAL NOT NULL
            )",
            [],
        )?;

        log::info!("✅ Record store initialized (billing_records)");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, FetchError> {
        self.conn
            .lock()
            .map_err(|_| FetchError::Unavailable("connection mutex poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch_all(&self) -> Result<Vec<Record>, FetchError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT date, service, description, cost FROM billing_records ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, service, description, cost) = row?;
            let record = Record::new(date, service, description, cost)
                .map_err(|e| FetchError::InvalidRow(e.to_string()))?;
            records.push(record);
        }

        log::debug!("📥 Fetched {} records", records.len());
        Ok(records)
    }

    async fn query_descriptions(&self) -> Result<Vec<String>, FetchError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT description FROM billing_records ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut descriptions = Vec::new();
        for row in rows {
            descriptions.push(row?);
        }

        log::debug!("📥 Fetched {} descriptions", descriptions.len());
        Ok(descriptions)
    }

    async fn insert(&self, record: &Record) -> Result<(), FetchError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO billing_records (date, service, description, cost)
             VALUES (?1, ?2, ?3, ?4)",
            params![record.date(), record.service(), record.description(), record.cost()],
        )?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
