//! Core Commands - Operation Surface for the Shell
//!
//! Plain async functions over a constructed [`CoreService`]. Typed errors
//! stay inside the core; every function here flattens them to
//! `Result<T, String>` for the rendering layer.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::logic::events::{ProgressSender, ScanEvent};
use crate::logic::history::{DashboardStats, HistoryFilter, ScanRecord};
use crate::logic::perf::PerformanceReport;
use crate::logic::pipeline::ScanOutcome;
use crate::logic::quarantine::{
    QuarantineEntry, QuarantineInconsistency, QuarantineStats, ThreatInfo,
};
use crate::CoreService;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Quarantine store contents plus anything found out of step with it
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineListing {
    pub entries: Vec<QuarantineEntry>,
    pub inconsistencies: Vec<QuarantineInconsistency>,
}

// ============================================================================
// SCAN COMMANDS
// ============================================================================

/// Scan one file and wait for its final outcome
pub async fn scan_file(service: &CoreService, path: String) -> Result<ScanOutcome, String> {
    service
        .pipeline
        .scan(Path::new(&path), &ProgressSender::disabled())
        .await
        .map_err(|e| e.to_string())
}

/// Scan one file, streaming progress while it runs.
///
/// The receiver yields monotone progress events and exactly one terminal
/// event; the handle resolves to the outcome once the scan finishes.
pub fn scan_file_with_progress(
    service: &CoreService,
    path: String,
) -> (
    mpsc::Receiver<ScanEvent>,
    JoinHandle<Result<ScanOutcome, String>>,
) {
    let (progress, rx) = ProgressSender::channel();
    let pipeline = service.pipeline.clone();
    let handle = tokio::spawn(async move {
        pipeline
            .scan(Path::new(&path), &progress)
            .await
            .map_err(|e| e.to_string())
    });
    (rx, handle)
}

// ============================================================================
// DASHBOARD COMMANDS
// ============================================================================

/// Aggregates for the dashboard header
pub async fn get_dashboard_stats(service: &CoreService) -> Result<DashboardStats, String> {
    Ok(service.history.dashboard_stats())
}

/// Most recent scans, newest first
pub async fn get_recent_scans(
    service: &CoreService,
    limit: Option<usize>,
) -> Result<Vec<ScanRecord>, String> {
    let limit = limit.unwrap_or(50);
    service.history.get_recent(limit).map_err(|e| e.to_string())
}

/// Scan history narrowed by status and time window
pub async fn get_scan_history(
    service: &CoreService,
    filter: HistoryFilter,
) -> Result<Vec<ScanRecord>, String> {
    service.history.query(&filter).map_err(|e| e.to_string())
}

/// Rolling scan performance summary
pub async fn get_performance_report(service: &CoreService) -> Result<PerformanceReport, String> {
    Ok(service.perf.report())
}

// ============================================================================
// QUARANTINE COMMANDS
// ============================================================================

/// Move a file into the quarantine store
pub async fn quarantine_file(
    service: &CoreService,
    path: String,
    threat_info: ThreatInfo,
) -> Result<QuarantineEntry, String> {
    let quarantine = service.quarantine.clone();
    let scan_id = threat_info.scan_id.clone();
    let entry =
        tokio::task::spawn_blocking(move || quarantine.quarantine(Path::new(&path), &threat_info))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;

    // Link back to the scan that produced the verdict, when known
    if let Some(scan_id) = &scan_id {
        let quarantine_path = entry.quarantine_path.to_string_lossy();
        if let Err(e) = service.history.mark_quarantined(scan_id, &quarantine_path) {
            log::error!("Failed to flag scan {} as quarantined: {}", scan_id, e);
        }
    }

    Ok(entry)
}

/// Put a quarantined file back, at its original path unless told otherwise
pub async fn restore_quarantined_file(
    service: &CoreService,
    entry_id: String,
    destination: Option<String>,
) -> Result<String, String> {
    let quarantine = service.quarantine.clone();
    let restored = tokio::task::spawn_blocking(move || {
        let dest = destination.map(PathBuf::from);
        quarantine.restore(&entry_id, dest.as_deref())
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?;
    Ok(restored.to_string_lossy().to_string())
}

/// Permanently remove a quarantined file
pub async fn delete_quarantined_file(
    service: &CoreService,
    entry_id: String,
) -> Result<bool, String> {
    let quarantine = service.quarantine.clone();
    tokio::task::spawn_blocking(move || quarantine.delete(&entry_id))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
    Ok(true)
}

/// Quarantine store totals
pub async fn get_quarantine_stats(service: &CoreService) -> Result<QuarantineStats, String> {
    service.quarantine.stats().map_err(|e| e.to_string())
}

/// Every entry in the store, plus files and rows that do not line up
pub async fn list_quarantine(service: &CoreService) -> Result<QuarantineListing, String> {
    let (entries, inconsistencies) = service.quarantine.list().map_err(|e| e.to_string())?;
    Ok(QuarantineListing {
        entries,
        inconsistencies,
    })
}

/// Delete quarantined files older than `max_age_days`; 0 clears everything
pub async fn cleanup_quarantine(
    service: &CoreService,
    max_age_days: u32,
) -> Result<usize, String> {
    let quarantine = service.quarantine.clone();
    tokio::task::spawn_blocking(move || quarantine.cleanup(max_age_days))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

// ============================================================================
// MAINTENANCE COMMANDS
// ============================================================================

/// Drop verdict cache rows past their expiry
pub async fn sweep_verdict_cache(service: &CoreService) -> Result<usize, String> {
    service.cache.sweep_expired().map_err(|e| e.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
