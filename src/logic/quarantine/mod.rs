//! Quarantine Manager
//!
//! Moves flagged files into an isolated store and tracks every entry in
//! SQLite so restores survive restarts.
//!
//! Features:
//! - Entry row is written before the file moves, then confirmed after,
//!   so an interrupted move never loses track of a file
//! - Restore to the original location or an explicit destination
//! - Secure deletion (zero overwrite before unlink)
//! - Consistency report between table rows and files on disk

mod types;

pub use types::{
    QuarantineEntry, QuarantineError, QuarantineInconsistency, QuarantineStats, QuarantineStatus,
    ThreatInfo,
};

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::logic::config::QuarantineConfig;
use crate::logic::storage::Database;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Extension given to files inside the quarantine root
const QUARANTINE_EXT: &str = "quarantine";

const ENTRY_COLUMNS: &str = "entry_id, original_path, quarantine_path, file_name, \
                             threat_info, quarantined_at, status, restored_at";

// ============================================================================
// QUARANTINE MANAGER
// ============================================================================

pub struct QuarantineManager {
    db: Arc<Database>,
    config: QuarantineConfig,
}

impl QuarantineManager {
    pub fn new(db: Arc<Database>, config: QuarantineConfig) -> Result<Self, QuarantineError> {
        fs::create_dir_all(&config.root).map_err(|e| QuarantineError::Other {
            message: format!("Failed to create quarantine root: {}", e),
        })?;
        Ok(Self { db, config })
    }

    /// Move a file into the quarantine store.
    ///
    /// The entry row is inserted as pending before the move and flipped to
    /// quarantined after, so a crash mid-move leaves a visible pending row
    /// instead of an untracked file.
    pub fn quarantine(
        &self,
        path: &Path,
        info: &ThreatInfo,
    ) -> Result<QuarantineEntry, QuarantineError> {
        if !path.exists() {
            return Err(QuarantineError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let metadata = fs::metadata(path).map_err(|e| QuarantineError::Other {
            message: e.to_string(),
        })?;
        let file_size = metadata.len();

        let limit_bytes = self.config.max_total_size_bytes();
        if self.disk_usage() + file_size > limit_bytes {
            return Err(QuarantineError::StoreFull {
                needed_bytes: file_size,
                limit_bytes,
            });
        }

        let entry_id = Uuid::new_v4().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        // ID-based name prevents collisions between same-named files
        let quarantine_path = self
            .config
            .root
            .join(format!("{}.{}", entry_id, QUARANTINE_EXT));

        let now = Utc::now().timestamp();
        let info_json = serde_json::to_string(info).map_err(|e| QuarantineError::Other {
            message: e.to_string(),
        })?;

        self.db.conn().execute(
            "INSERT INTO quarantine
             (entry_id, original_path, quarantine_path, file_name,
              threat_info, quarantined_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending')",
            params![
                entry_id,
                path.to_string_lossy().to_string(),
                quarantine_path.to_string_lossy().to_string(),
                file_name,
                info_json,
                now
            ],
        )?;

        if let Err(e) = move_file(path, &quarantine_path) {
            // The source is still in place, so undo the partial move
            let _ = fs::remove_file(&quarantine_path);
            let _ = self.db.conn().execute(
                "DELETE FROM quarantine WHERE entry_id = ?1",
                params![entry_id],
            );
            return Err(QuarantineError::Other {
                message: format!("Failed to quarantine file: {}", e),
            });
        }

        self.db.conn().execute(
            "UPDATE quarantine SET status = 'quarantined' WHERE entry_id = ?1",
            params![entry_id],
        )?;

        log::warn!(
            "Quarantined file: {} -> {}",
            path.display(),
            quarantine_path.display()
        );

        Ok(QuarantineEntry {
            entry_id,
            original_path: path.to_path_buf(),
            quarantine_path,
            file_name,
            threat_info: info.clone(),
            quarantined_at: now,
            status: QuarantineStatus::Quarantined,
            restored_at: None,
        })
    }

    /// Restore a quarantined file to its original location, or to an
    /// explicit destination. An occupied target gets a `_restored` suffix.
    pub fn restore(
        &self,
        entry_id: &str,
        destination: Option<&Path>,
    ) -> Result<PathBuf, QuarantineError> {
        let entry = self
            .get(entry_id)?
            .ok_or_else(|| QuarantineError::EntryNotFound {
                id: entry_id.to_string(),
            })?;

        if entry.status == QuarantineStatus::Restored {
            return Err(QuarantineError::Other {
                message: format!("Entry already restored: {}", entry_id),
            });
        }

        if !entry.quarantine_path.exists() {
            return Err(QuarantineError::FileNotFound {
                path: entry.quarantine_path.to_string_lossy().to_string(),
            });
        }

        let target = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| entry.original_path.clone());
        let restore_path = if target.exists() {
            with_restored_suffix(&target)
        } else {
            target
        };

        // The original directory may have been removed since the scan
        if let Some(parent) = restore_path.parent() {
            fs::create_dir_all(parent).map_err(|e| QuarantineError::Other {
                message: format!("Failed to create restore directory: {}", e),
            })?;
        }

        move_file(&entry.quarantine_path, &restore_path).map_err(|e| QuarantineError::Other {
            message: format!("Failed to restore file: {}", e),
        })?;

        self.db.conn().execute(
            "UPDATE quarantine SET status = 'restored', restored_at = ?1 WHERE entry_id = ?2",
            params![Utc::now().timestamp(), entry_id],
        )?;

        log::info!(
            "Restored file: {} -> {}",
            entry.quarantine_path.display(),
            restore_path.display()
        );

        Ok(restore_path)
    }

    /// Permanently delete a quarantined file and its entry
    pub fn delete(&self, entry_id: &str) -> Result<(), QuarantineError> {
        let entry = self
            .get(entry_id)?
            .ok_or_else(|| QuarantineError::EntryNotFound {
                id: entry_id.to_string(),
            })?;

        if entry.quarantine_path.exists() {
            secure_erase(&entry.quarantine_path).map_err(|e| QuarantineError::Other {
                message: format!("Failed to delete file: {}", e),
            })?;
        }

        self.db.conn().execute(
            "DELETE FROM quarantine WHERE entry_id = ?1",
            params![entry_id],
        )?;

        log::info!("Deleted quarantined file: {}", entry.file_name);

        Ok(())
    }

    /// Fetch a single entry by id
    pub fn get(&self, entry_id: &str) -> Result<Option<QuarantineEntry>, QuarantineError> {
        use rusqlite::OptionalExtension;

        let conn = self.db.conn();
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM quarantine WHERE entry_id = ?1",
                    ENTRY_COLUMNS
                ),
                params![entry_id],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// All entries, newest first, plus a consistency report of orphaned
    /// files, missing files and stale pending rows.
    pub fn list(
        &self,
    ) -> Result<(Vec<QuarantineEntry>, Vec<QuarantineInconsistency>), QuarantineError> {
        let entries = self.all_entries()?;

        let now = Utc::now().timestamp();
        let mut inconsistencies = Vec::new();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for entry in &entries {
            match entry.status {
                QuarantineStatus::Quarantined => {
                    claimed.insert(entry.quarantine_path.clone());
                    if !entry.quarantine_path.exists() {
                        inconsistencies.push(QuarantineInconsistency::MissingFile {
                            entry_id: entry.entry_id.clone(),
                            path: entry.quarantine_path.clone(),
                        });
                    }
                }
                QuarantineStatus::Pending => {
                    claimed.insert(entry.quarantine_path.clone());
                    let age_secs = now - entry.quarantined_at;
                    if age_secs > self.config.pending_grace_secs {
                        inconsistencies.push(QuarantineInconsistency::StalePending {
                            entry_id: entry.entry_id.clone(),
                            age_secs,
                        });
                    }
                }
                QuarantineStatus::Restored => {}
            }
        }

        if let Ok(dir) = fs::read_dir(&self.config.root) {
            for file in dir.flatten() {
                let path = file.path();
                let is_store_file = path
                    .extension()
                    .map(|e| e == QUARANTINE_EXT)
                    .unwrap_or(false);
                if is_store_file && !claimed.contains(&path) {
                    inconsistencies.push(QuarantineInconsistency::OrphanFile { path });
                }
            }
        }

        Ok((entries, inconsistencies))
    }

    /// Delete quarantined entries older than the given age in days.
    /// Zero deletes every quarantined entry. Returns the number of files
    /// removed.
    pub fn cleanup(&self, max_age_days: u32) -> Result<usize, QuarantineError> {
        let cutoff = if max_age_days == 0 {
            i64::MAX
        } else {
            Utc::now().timestamp() - max_age_days as i64 * 86_400
        };

        let ids: Vec<String> = {
            let conn = self.db.conn();
            let mut stmt = conn.prepare(
                "SELECT entry_id FROM quarantine
                 WHERE status = 'quarantined' AND quarantined_at <= ?1",
            )?;
            let rows = stmt.query_map(params![cutoff], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()?
        };

        let mut removed = 0;
        for id in &ids {
            match self.delete(id) {
                Ok(()) => removed += 1,
                Err(e) => log::error!("Cleanup failed for {}: {}", id, e),
            }
        }

        // Pending rows past the grace window with no file on disk never
        // completed a move; the rows are dead weight.
        let grace_cutoff = Utc::now().timestamp() - self.config.pending_grace_secs;
        let stale: Vec<(String, String)> = {
            let conn = self.db.conn();
            let mut stmt = conn.prepare(
                "SELECT entry_id, quarantine_path FROM quarantine
                 WHERE status = 'pending' AND quarantined_at <= ?1",
            )?;
            let rows = stmt.query_map(params![grace_cutoff], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect::<Result<Vec<(String, String)>, _>>()?
        };
        for (id, qpath) in stale {
            if !Path::new(&qpath).exists() {
                self.db.conn().execute(
                    "DELETE FROM quarantine WHERE entry_id = ?1",
                    params![id],
                )?;
                log::debug!("Dropped dead pending quarantine row: {}", id);
            }
        }

        if removed > 0 {
            log::info!("Quarantine cleanup removed {} files", removed);
        }

        Ok(removed)
    }

    /// Stats over active entries, sizes measured from the files on disk
    pub fn stats(&self) -> Result<QuarantineStats, QuarantineError> {
        let entries = self.all_entries()?;

        let mut total_files = 0usize;
        let mut restored_files = 0usize;
        let mut total_size = 0u64;
        let mut oldest: Option<i64> = None;
        let mut newest: Option<i64> = None;

        for entry in &entries {
            if entry.status == QuarantineStatus::Restored {
                restored_files += 1;
            }
            if entry.status != QuarantineStatus::Quarantined {
                continue;
            }
            total_files += 1;
            if let Ok(meta) = fs::metadata(&entry.quarantine_path) {
                total_size += meta.len();
            }
            oldest = Some(oldest.map_or(entry.quarantined_at, |o| o.min(entry.quarantined_at)));
            newest = Some(newest.map_or(entry.quarantined_at, |n| n.max(entry.quarantined_at)));
        }

        Ok(QuarantineStats {
            total_files,
            restored_files,
            total_size_bytes: total_size,
            total_size_mb: total_size as f64 / (1024.0 * 1024.0),
            oldest_entry: oldest,
            newest_entry: newest,
        })
    }

    fn all_entries(&self) -> Result<Vec<QuarantineEntry>, QuarantineError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM quarantine ORDER BY quarantined_at DESC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Bytes currently occupied by the store directory, orphans included
    fn disk_usage(&self) -> u64 {
        let mut total = 0u64;
        if let Ok(dir) = fs::read_dir(&self.config.root) {
            for file in dir.flatten() {
                if let Ok(meta) = file.metadata() {
                    if meta.is_file() {
                        total += meta.len();
                    }
                }
            }
        }
        total
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuarantineEntry> {
    let original_path: String = row.get(1)?;
    let quarantine_path: String = row.get(2)?;
    let info_json: String = row.get(4)?;
    let status: String = row.get(6)?;

    Ok(QuarantineEntry {
        entry_id: row.get(0)?,
        original_path: PathBuf::from(original_path),
        quarantine_path: PathBuf::from(quarantine_path),
        file_name: row.get(3)?,
        threat_info: serde_json::from_str(&info_json).unwrap_or_default(),
        quarantined_at: row.get(5)?,
        status: QuarantineStatus::parse(&status),
        restored_at: row.get(7)?,
    })
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    // Rename fails across devices; fall back to copy + delete
    fs::rename(from, to).or_else(|_| fs::copy(from, to).and_then(|_| fs::remove_file(from)))
}

/// Overwrite the file with zeros before unlinking it
fn secure_erase(path: &Path) -> std::io::Result<()> {
    let size = fs::metadata(path)?.len();
    {
        let mut file = fs::OpenOptions::new().write(true).open(path)?;
        let zeros = vec![0u8; 4096];
        for _ in 0..(size / 4096 + 1) {
            file.write_all(&zeros)?;
        }
        file.sync_all()?;
    }
    fs::remove_file(path)
}

fn with_restored_suffix(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = path
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();
    let mut out = path.to_path_buf();
    out.set_file_name(format!("{}_restored{}", stem, ext));
    out
}

// ============================================================================
// TESTS
// ============================================================================
