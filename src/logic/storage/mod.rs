//! SQLite Storage
//!
//! One database file under the platform data root, shared by the verdict
//! cache, scan history and quarantine repositories. A single mutex around
//! the connection gives each store one logical writer; readers go through
//! the same handle and tolerate the serialization.
//!
//! Schema is created on open, so a fresh install needs no migration step.

use std::fmt;
use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum StoreError {
    Database { message: String },
    Io { message: String },
    Serde { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database { message } => write!(f, "Database error: {}", message),
            StoreError::Io { message } => write!(f, "I/O error: {}", message),
            StoreError::Serde { message } => write!(f, "Serialization error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database { message: e.to_string() }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io { message: e.to_string() }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde { message: e.to_string() }
    }
}

// ============================================================================
// DATABASE HANDLE
// ============================================================================

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and initialize schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;

        log::info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    /// Lock the underlying connection
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS verdict_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                digest TEXT UNIQUE NOT NULL,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                verdict TEXT NOT NULL,
                cached_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS scan_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id TEXT UNIQUE NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                digest TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                scanned_at INTEGER NOT NULL,
                status TEXT NOT NULL,
                positives INTEGER NOT NULL DEFAULT 0,
                total_engines INTEGER NOT NULL DEFAULT 0,
                analysis_id TEXT,
                permalink TEXT,
                detections TEXT,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                quarantined INTEGER NOT NULL DEFAULT 0,
                quarantine_path TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS quarantine (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id TEXT UNIQUE NOT NULL,
                original_path TEXT NOT NULL,
                quarantine_path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                threat_info TEXT NOT NULL,
                quarantined_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                restored_at INTEGER
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_verdict_cache_expires
             ON verdict_cache(expires_at)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scan_history_scanned_at
             ON scan_history(scanned_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scan_history_digest
             ON scan_history(digest)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quarantine_time
             ON quarantine(quarantined_at DESC)",
            [],
        )?;

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
