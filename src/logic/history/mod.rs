//! Scan History Store
//!
//! Persists completed scan records with bounded retention and keeps the
//! dashboard aggregates current.
//!
//! Features:
//! - Bounded retention, oldest rows evicted past the cap
//! - Filtered retrieval by status and date range
//! - Dashboard stats updated on each append, rebuildable from SQL
//! - Quarantine flag linking a record to its quarantine entry

mod types;

pub use types::{DashboardStats, HistoryFilter, ScanRecord, ScanStatus};

use std::sync::Arc;

use parking_lot::RwLock;
use rusqlite::params;

use crate::logic::config::HistoryConfig;
use crate::logic::storage::{Database, StoreError};

const RECORD_COLUMNS: &str = "scan_id, file_name, file_path, digest, file_size, scanned_at, \
                              status, positives, total_engines, analysis_id, permalink, \
                              detections, duration_ms, quarantined, quarantine_path";

// ============================================================================
// HISTORY STORE
// ============================================================================

pub struct HistoryStore {
    db: Arc<Database>,
    config: HistoryConfig,
    stats: RwLock<DashboardStats>,
}

impl HistoryStore {
    /// Open the store and seed the dashboard aggregates from existing rows
    pub fn new(db: Arc<Database>, config: HistoryConfig) -> Result<Self, StoreError> {
        let store = Self {
            db,
            config,
            stats: RwLock::new(DashboardStats::default()),
        };
        store.recompute_stats()?;
        Ok(store)
    }

    /// Append one record, evict rows beyond retention, bump the aggregates.
    ///
    /// Counters are not decremented on eviction; `recompute_stats` is the
    /// reconciliation path and runs on every startup.
    pub fn append(&self, record: &ScanRecord) -> Result<(), StoreError> {
        let detections_json = serde_json::to_string(&record.detections)?;

        {
            let conn = self.db.conn();
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO scan_history ({})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    RECORD_COLUMNS
                ),
                params![
                    record.scan_id,
                    record.file_name,
                    record.file_path,
                    record.digest,
                    record.file_size as i64,
                    record.scanned_at,
                    record.status.as_str(),
                    record.positives,
                    record.total_engines,
                    record.analysis_id,
                    record.permalink,
                    detections_json,
                    record.duration_ms as i64,
                    record.quarantined,
                    record.quarantine_path
                ],
            )?;

            conn.execute(
                "DELETE FROM scan_history WHERE id NOT IN
                 (SELECT id FROM scan_history ORDER BY id DESC LIMIT ?1)",
                params![self.config.retention as i64],
            )?;
        }

        let mut stats = self.stats.write();
        stats.total_scans += 1;
        if record.status.is_threat() {
            stats.threats_detected += 1;
        }
        if record.quarantined {
            stats.files_quarantined += 1;
        }
        stats.last_scan = Some(
            stats
                .last_scan
                .map_or(record.scanned_at, |t| t.max(record.scanned_at)),
        );

        Ok(())
    }

    /// Latest records, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<ScanRecord>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scan_history ORDER BY scanned_at DESC, id DESC LIMIT ?1",
            RECORD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Records matching the filter, newest first
    pub fn query(&self, filter: &HistoryFilter) -> Result<Vec<ScanRecord>, StoreError> {
        let mut sql = format!("SELECT {} FROM scan_history WHERE 1=1", RECORD_COLUMNS);
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND scanned_at >= ?");
            values.push(Box::new(since));
        }
        if let Some(until) = filter.until {
            sql.push_str(" AND scanned_at <= ?");
            values.push(Box::new(until));
        }
        sql.push_str(" ORDER BY scanned_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Box::new(limit as i64));
        }

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = values
            .iter()
            .map(|v| v.as_ref() as &dyn rusqlite::ToSql)
            .collect();
        let rows = stmt.query_map(&param_refs[..], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Flag a record whose file went to quarantine. Returns false when the
    /// record is unknown or already flagged.
    pub fn mark_quarantined(
        &self,
        scan_id: &str,
        quarantine_path: &str,
    ) -> Result<bool, StoreError> {
        let changed = self.db.conn().execute(
            "UPDATE scan_history SET quarantined = 1, quarantine_path = ?2
             WHERE scan_id = ?1 AND quarantined = 0",
            params![scan_id, quarantine_path],
        )?;

        if changed > 0 {
            self.stats.write().files_quarantined += 1;
        }
        Ok(changed > 0)
    }

    /// Current dashboard aggregates
    pub fn dashboard_stats(&self) -> DashboardStats {
        self.stats.read().clone()
    }

    /// Rebuild the aggregates from the history table
    pub fn recompute_stats(&self) -> Result<DashboardStats, StoreError> {
        let rebuilt = self.db.conn().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status IN ('malicious', 'critical')
                                      THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(quarantined), 0),
                    MAX(scanned_at)
             FROM scan_history",
            [],
            |row| {
                Ok(DashboardStats {
                    total_scans: row.get::<_, i64>(0)? as u64,
                    threats_detected: row.get::<_, i64>(1)? as u64,
                    files_quarantined: row.get::<_, i64>(2)? as u64,
                    last_scan: row.get(3)?,
                })
            },
        )?;

        *self.stats.write() = rebuilt.clone();
        Ok(rebuilt)
    }

    pub fn record_count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.db
                .conn()
                .query_row("SELECT COUNT(*) FROM scan_history", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanRecord> {
    let status: String = row.get(6)?;
    let detections_json: Option<String> = row.get(11)?;
    let detections = detections_json
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();

    Ok(ScanRecord {
        scan_id: row.get(0)?,
        file_name: row.get(1)?,
        file_path: row.get(2)?,
        digest: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        scanned_at: row.get(5)?,
        status: ScanStatus::parse(&status),
        positives: row.get(7)?,
        total_engines: row.get(8)?,
        analysis_id: row.get(9)?,
        permalink: row.get(10)?,
        detections,
        duration_ms: row.get::<_, i64>(12)? as u64,
        quarantined: row.get(13)?,
        quarantine_path: row.get(14)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(retention: usize) -> HistoryStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        HistoryStore::new(db, HistoryConfig { retention }).unwrap()
    }

    fn record(scan_id: &str, status: ScanStatus, scanned_at: i64) -> ScanRecord {
        ScanRecord {
            scan_id: scan_id.to_string(),
            file_name: format!("{}.bin", scan_id),
            file_path: format!("/downloads/{}.bin", scan_id),
            digest: "a".repeat(64),
            file_size: 2048,
            scanned_at,
            status,
            positives: if status.is_threat() { 12 } else { 0 },
            total_engines: 70,
            analysis_id: Some("an-1".to_string()),
            permalink: None,
            detections: Vec::new(),
            duration_ms: 1500,
            quarantined: false,
            quarantine_path: None,
        }
    }

    #[test]
    fn test_append_and_get_recent() {
        let store = setup(100);
        store.append(&record("s1", ScanStatus::Clean, 100)).unwrap();
        store
            .append(&record("s2", ScanStatus::Malicious, 200))
            .unwrap();
        store.append(&record("s3", ScanStatus::Clean, 300)).unwrap();

        let recent = store.get_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].scan_id, "s3");
        assert_eq!(recent[1].scan_id, "s2");
        assert_eq!(recent[1].status, ScanStatus::Malicious);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let store = setup(5);
        for i in 0..8 {
            store
                .append(&record(&format!("s{}", i), ScanStatus::Clean, i))
                .unwrap();
        }

        assert_eq!(store.record_count().unwrap(), 5);

        let recent = store.get_recent(10).unwrap();
        assert_eq!(recent.first().unwrap().scan_id, "s7");
        assert_eq!(recent.last().unwrap().scan_id, "s3");
    }

    #[test]
    fn test_query_by_status_and_range() {
        let store = setup(100);
        store.append(&record("s1", ScanStatus::Clean, 100)).unwrap();
        store
            .append(&record("s2", ScanStatus::Malicious, 200))
            .unwrap();
        store
            .append(&record("s3", ScanStatus::Malicious, 300))
            .unwrap();
        store.append(&record("s4", ScanStatus::Error, 400)).unwrap();

        let threats = store
            .query(&HistoryFilter {
                status: Some(ScanStatus::Malicious),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(threats.len(), 2);

        let windowed = store
            .query(&HistoryFilter {
                status: Some(ScanStatus::Malicious),
                since: Some(250),
                until: Some(350),
                limit: Some(10),
            })
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].scan_id, "s3");
    }

    #[test]
    fn test_mark_quarantined_flips_once() {
        let store = setup(100);
        store
            .append(&record("s1", ScanStatus::Malicious, 100))
            .unwrap();

        assert!(store.mark_quarantined("s1", "/q/s1.quarantine").unwrap());
        assert!(!store.mark_quarantined("s1", "/q/other.quarantine").unwrap());
        assert!(!store.mark_quarantined("missing", "/q/x").unwrap());

        let recent = store.get_recent(1).unwrap();
        assert!(recent[0].quarantined);
        assert_eq!(
            recent[0].quarantine_path.as_deref(),
            Some("/q/s1.quarantine")
        );
        assert_eq!(store.dashboard_stats().files_quarantined, 1);
    }

    #[test]
    fn test_incremental_stats_match_recompute() {
        let store = setup(100);
        store.append(&record("s1", ScanStatus::Clean, 100)).unwrap();
        store
            .append(&record("s2", ScanStatus::Malicious, 200))
            .unwrap();
        store
            .append(&record("s3", ScanStatus::Critical, 300))
            .unwrap();

        let incremental = store.dashboard_stats();
        let rebuilt = store.recompute_stats().unwrap();

        assert_eq!(incremental, rebuilt);
        assert_eq!(rebuilt.total_scans, 3);
        assert_eq!(rebuilt.threats_detected, 2);
        assert_eq!(rebuilt.last_scan, Some(300));
    }

    #[test]
    fn test_stats_seeded_from_existing_rows() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let first = HistoryStore::new(db.clone(), HistoryConfig { retention: 100 }).unwrap();
        first
            .append(&record("s1", ScanStatus::Malicious, 100))
            .unwrap();
        first.append(&record("s2", ScanStatus::Clean, 200)).unwrap();

        let second = HistoryStore::new(db, HistoryConfig { retention: 100 }).unwrap();
        let stats = second.dashboard_stats();
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.threats_detected, 1);
        assert_eq!(stats.last_scan, Some(200));
    }

    #[test]
    fn test_detections_survive_round_trip() {
        use crate::logic::remote::EngineDetection;

        let store = setup(100);
        let mut rec = record("s1", ScanStatus::Malicious, 100);
        rec.detections = vec![EngineDetection {
            engine: "TestAV".to_string(),
            result: "Trojan.Generic".to_string(),
            category: "malicious".to_string(),
        }];
        store.append(&rec).unwrap();

        let fetched = store.get_recent(1).unwrap();
        assert_eq!(fetched[0].detections.len(), 1);
        assert_eq!(fetched[0].detections[0].engine, "TestAV");
    }
}
