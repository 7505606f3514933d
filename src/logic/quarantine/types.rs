//! Quarantine Types

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logic::storage::StoreError;

// ============================================================================
// ENTRY TYPES
// ============================================================================

/// Lifecycle of a quarantine entry.
///
/// A row is written as `Pending` before the file moves and flipped to
/// `Quarantined` after, so an interrupted move is visible in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuarantineStatus {
    Pending,
    Quarantined,
    Restored,
}

impl QuarantineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineStatus::Pending => "pending",
            QuarantineStatus::Quarantined => "quarantined",
            QuarantineStatus::Restored => "restored",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "quarantined" => QuarantineStatus::Quarantined,
            "restored" => QuarantineStatus::Restored,
            _ => QuarantineStatus::Pending,
        }
    }
}

/// Why the file was quarantined, stored as JSON next to the entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatInfo {
    pub digest: String,
    pub threat_level: String,
    pub positives: u32,
    pub total_engines: u32,
    #[serde(default)]
    pub scan_id: Option<String>,
}

impl Default for ThreatInfo {
    fn default() -> Self {
        Self {
            digest: String::new(),
            threat_level: "unknown".to_string(),
            positives: 0,
            total_engines: 0,
            scan_id: None,
        }
    }
}

/// One quarantined file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub entry_id: String,
    pub original_path: PathBuf,
    pub quarantine_path: PathBuf,
    pub file_name: String,
    pub threat_info: ThreatInfo,
    pub quarantined_at: i64,
    pub status: QuarantineStatus,
    pub restored_at: Option<i64>,
}

// ============================================================================
// CONSISTENCY REPORT
// ============================================================================

/// Discrepancy between the quarantine table and the files on disk
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuarantineInconsistency {
    /// A file in the store that no active row claims
    OrphanFile { path: PathBuf },
    /// A quarantined row whose stored file is gone
    MissingFile { entry_id: String, path: PathBuf },
    /// A pending row older than the grace window
    StalePending { entry_id: String, age_secs: i64 },
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct QuarantineStats {
    pub total_files: usize,
    pub restored_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub oldest_entry: Option<i64>,
    pub newest_entry: Option<i64>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum QuarantineError {
    /// Source or stored file not found
    FileNotFound { path: String },
    /// No entry with this id
    EntryNotFound { id: String },
    /// The store would exceed its size cap
    StoreFull { needed_bytes: u64, limit_bytes: u64 },
    /// Underlying database failure
    Database { message: String },
    /// Other error
    Other { message: String },
}

impl fmt::Display for QuarantineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuarantineError::FileNotFound { path } => write!(f, "File not found: {}", path),
            QuarantineError::EntryNotFound { id } => {
                write!(f, "Quarantine entry not found: {}", id)
            }
            QuarantineError::StoreFull {
                needed_bytes,
                limit_bytes,
            } => write!(
                f,
                "Quarantine store full: {} bytes needed, {} byte limit",
                needed_bytes, limit_bytes
            ),
            QuarantineError::Database { message } => write!(f, "Database error: {}", message),
            QuarantineError::Other { message } => write!(f, "Error: {}", message),
        }
    }
}

impl std::error::Error for QuarantineError {}

impl From<StoreError> for QuarantineError {
    fn from(err: StoreError) -> Self {
        QuarantineError::Database {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for QuarantineError {
    fn from(err: rusqlite::Error) -> Self {
        QuarantineError::Database {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
