//! Scan History Types

use serde::{Deserialize, Serialize};

use crate::logic::remote::EngineDetection;
use crate::logic::verdict::ThreatLevel;

// ============================================================================
// SCAN STATUS
// ============================================================================

/// Final disposition of one scan as stored in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Clean,
    Suspicious,
    Malicious,
    Critical,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Clean => "clean",
            ScanStatus::Suspicious => "suspicious",
            ScanStatus::Malicious => "malicious",
            ScanStatus::Critical => "critical",
            ScanStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "clean" => ScanStatus::Clean,
            "suspicious" => ScanStatus::Suspicious,
            "malicious" => ScanStatus::Malicious,
            "critical" => ScanStatus::Critical,
            _ => ScanStatus::Error,
        }
    }

    pub fn is_threat(&self) -> bool {
        matches!(self, ScanStatus::Malicious | ScanStatus::Critical)
    }
}

impl From<ThreatLevel> for ScanStatus {
    fn from(level: ThreatLevel) -> Self {
        match level {
            ThreatLevel::Clean => ScanStatus::Clean,
            ThreatLevel::Suspicious => ScanStatus::Suspicious,
            ThreatLevel::Malicious => ScanStatus::Malicious,
            ThreatLevel::Critical => ScanStatus::Critical,
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One completed scan, as persisted in the history table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub file_name: String,
    pub file_path: String,
    pub digest: String,
    pub file_size: u64,
    pub scanned_at: i64,
    pub status: ScanStatus,
    pub positives: u32,
    pub total_engines: u32,
    pub analysis_id: Option<String>,
    pub permalink: Option<String>,
    pub detections: Vec<EngineDetection>,
    pub duration_ms: u64,
    pub quarantined: bool,
    pub quarantine_path: Option<String>,
}

/// Criteria for filtered history retrieval; unset fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub status: Option<ScanStatus>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
}

// ============================================================================
// DASHBOARD STATS
// ============================================================================

/// Aggregates shown on the dashboard, kept incrementally and
/// rebuildable from the history table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_scans: u64,
    pub threats_detected: u64,
    pub files_quarantined: u64,
    pub last_scan: Option<i64>,
}

// ============================================================================
// TESTS
// ============================================================================
