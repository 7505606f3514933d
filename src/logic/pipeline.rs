//! Scan Pipeline
//!
//! Drives one file through the full flow: hash, cache lookup, local
//! heuristics, remote orchestration, aggregation, persistence.
//!
//! Features:
//! - Trusted cache hits short-circuit remote and heuristic work
//! - Heuristics and remote analysis run concurrently on a miss
//! - Every completed scan lands in history; failures get an error record
//! - Progress events per stage over the scan's bounded channel

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::logic::cache::VerdictCache;
use crate::logic::config::CoreConfig;
use crate::logic::events::{ProgressSender, ScanStage};
use crate::logic::hasher;
use crate::logic::heuristics::HeuristicAnalyzer;
use crate::logic::history::{HistoryStore, ScanRecord, ScanStatus};
use crate::logic::perf::PerformanceMonitor;
use crate::logic::remote::{EngineDetection, RemoteScanReport, ScanOrchestrator};
use crate::logic::verdict::{self, AggregatedVerdict, RiskThresholds};

// ============================================================================
// TYPES
// ============================================================================

/// Result of scanning one file, returned to the caller and persisted
/// as a history record
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub digest: String,
    pub status: ScanStatus,
    pub risk_score: f64,
    pub confidence: f64,
    pub positives: u32,
    pub total_engines: u32,
    pub analysis_id: Option<String>,
    pub permalink: Option<String>,
    pub detections: Vec<EngineDetection>,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub duration_ms: u64,
    pub from_cache: bool,
    pub scanned_at: i64,
}

impl ScanOutcome {
    pub fn to_record(&self) -> ScanRecord {
        ScanRecord {
            scan_id: self.scan_id.clone(),
            file_name: self.file_name.clone(),
            file_path: self.file_path.clone(),
            digest: self.digest.clone(),
            file_size: self.file_size,
            scanned_at: self.scanned_at,
            status: self.status,
            positives: self.positives,
            total_engines: self.total_engines,
            analysis_id: self.analysis_id.clone(),
            permalink: self.permalink.clone(),
            detections: self.detections.clone(),
            duration_ms: self.duration_ms,
            quarantined: false,
            quarantine_path: None,
        }
    }
}

/// Failure before a file's content identity could be established.
/// Anything after that point becomes an error-status outcome instead.
#[derive(Debug)]
pub enum ScanError {
    /// File missing at scan time
    FileNotFound { path: String },
    /// File unreadable or not a regular file
    Io { message: String },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::FileNotFound { path } => write!(f, "File not found: {}", path),
            ScanError::Io { message } => write!(f, "I/O error: {}", message),
        }
    }
}

impl std::error::Error for ScanError {}

// ============================================================================
// SCAN PIPELINE
// ============================================================================

pub struct ScanPipeline {
    config: CoreConfig,
    cache: Arc<VerdictCache>,
    analyzer: HeuristicAnalyzer,
    orchestrator: Arc<ScanOrchestrator>,
    history: Arc<HistoryStore>,
    perf: Arc<PerformanceMonitor>,
    thresholds: RiskThresholds,
}

struct ScanContext {
    scan_id: String,
    file_name: String,
    file_path: String,
    file_size: u64,
    digest: String,
    scanned_at: i64,
    started: Instant,
}

impl ScanPipeline {
    pub fn new(
        config: CoreConfig,
        cache: Arc<VerdictCache>,
        analyzer: HeuristicAnalyzer,
        orchestrator: Arc<ScanOrchestrator>,
        history: Arc<HistoryStore>,
        perf: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            config,
            cache,
            analyzer,
            orchestrator,
            history,
            perf,
            thresholds: RiskThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Scan one file end to end.
    ///
    /// Returns `Err` only when the file cannot be identified at all;
    /// later failures produce an error-status outcome that is persisted
    /// like any other scan.
    pub async fn scan(
        &self,
        path: &Path,
        progress: &ProgressSender,
    ) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::FileNotFound {
                    path: path.to_string_lossy().to_string(),
                }
            } else {
                ScanError::Io {
                    message: format!("Cannot read {}: {}", path.display(), e),
                }
            }
        })?;
        if !metadata.is_file() {
            return Err(ScanError::Io {
                message: format!("Not a regular file: {}", path.display()),
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        progress.emit_stage(ScanStage::Hashing, 0.0);
        let digest = hasher::digest_file_async(path).await.map_err(|e| ScanError::Io {
            message: format!("Failed to hash {}: {}", path.display(), e),
        })?;
        progress.emit_stage(ScanStage::Hashing, 1.0);

        let ctx = ScanContext {
            scan_id: Uuid::new_v4().to_string(),
            file_name,
            file_path: path.to_string_lossy().to_string(),
            file_size: metadata.len(),
            digest,
            scanned_at: Utc::now().timestamp(),
            started,
        };

        // Cache lookup; a store failure is a miss, never a scan failure
        let cached = match self.cache.lookup(&ctx.digest) {
            Ok(hit) => hit,
            Err(e) => {
                log::error!("Cache lookup failed for {}: {}", ctx.digest, e);
                None
            }
        };
        progress.emit_stage(ScanStage::CacheLookup, 1.0);

        if let Some(entry) = &cached {
            if self.cache.is_trusted(entry) {
                log::info!(
                    "Trusted cache hit for {} (confidence {:.0})",
                    ctx.digest,
                    entry.confidence
                );
                let verdict = verdict::aggregate_cached(entry, &self.thresholds);
                let permalink = Some(format!(
                    "{}/{}",
                    self.config.remote.permalink_base, ctx.digest
                ));
                return Ok(self.complete(ctx, verdict, true, None, permalink, Vec::new(), progress));
            }
        }

        // Below the trust threshold a hit is only a prior; fresh evidence
        // is still gathered
        progress.emit_stage(ScanStage::Analyzing, 0.0);
        let heuristics_fut = async {
            let report = self.analyzer.analyze_file_async(path).await;
            progress.emit_stage(ScanStage::Analyzing, 1.0);
            report
        };
        let remote_fut = async {
            if self.orchestrator.is_available() {
                Some(
                    self.orchestrator
                        .scan(path, &ctx.digest, &ctx.file_name, ctx.file_size, progress)
                        .await,
                )
            } else {
                log::debug!("Remote scanning unavailable, using local heuristics only");
                None
            }
        };
        let (heuristic_result, remote_outcome) = tokio::join!(heuristics_fut, remote_fut);

        let heuristics = heuristic_result.map_err(|e| ScanError::Io {
            message: format!("Failed to analyze {}: {}", path.display(), e),
        })?;

        match remote_outcome {
            Some(Err(api_error)) => {
                let reason = api_error.to_string();
                log::error!("Remote analysis of {} failed: {}", ctx.file_name, reason);
                Ok(self.fail(ctx, reason, progress))
            }
            Some(Ok(report)) => {
                let verdict =
                    verdict::aggregate(Some(&report), cached.as_ref(), &heuristics, &self.thresholds);
                Ok(self.complete(
                    ctx,
                    verdict,
                    false,
                    Some(report.analysis_id.clone()),
                    Some(report.permalink.clone()),
                    report.detections,
                    progress,
                ))
            }
            None => {
                let verdict =
                    verdict::aggregate(None, cached.as_ref(), &heuristics, &self.thresholds);
                Ok(self.complete(ctx, verdict, false, None, None, Vec::new(), progress))
            }
        }
    }

    fn complete(
        &self,
        ctx: ScanContext,
        verdict: AggregatedVerdict,
        from_cache: bool,
        analysis_id: Option<String>,
        permalink: Option<String>,
        detections: Vec<EngineDetection>,
        progress: &ProgressSender,
    ) -> ScanOutcome {
        progress.emit_stage(ScanStage::Finalizing, 0.0);

        let outcome = ScanOutcome {
            scan_id: ctx.scan_id,
            file_name: ctx.file_name,
            file_path: ctx.file_path,
            file_size: ctx.file_size,
            digest: ctx.digest,
            status: ScanStatus::from(verdict.threat_level),
            risk_score: verdict.risk_score,
            confidence: verdict.confidence,
            positives: verdict.positives,
            total_engines: verdict.total_engines,
            analysis_id,
            permalink,
            detections,
            reasons: verdict.reasons,
            recommendations: verdict.recommendations,
            duration_ms: ctx.started.elapsed().as_millis() as u64,
            from_cache,
            scanned_at: ctx.scanned_at,
        };

        self.persist(&outcome);
        self.perf.record(
            &outcome.scan_id,
            &outcome.file_name,
            outcome.file_size,
            outcome.duration_ms,
        );

        progress.emit_stage(ScanStage::Finalizing, 1.0);
        progress.completed(&outcome.scan_id, outcome.status.as_str());

        log::info!(
            "Scan {} finished: {} is {} ({}ms)",
            outcome.scan_id,
            outcome.file_name,
            outcome.status.as_str(),
            outcome.duration_ms
        );

        outcome
    }

    fn fail(&self, ctx: ScanContext, reason: String, progress: &ProgressSender) -> ScanOutcome {
        let outcome = ScanOutcome {
            scan_id: ctx.scan_id,
            file_name: ctx.file_name,
            file_path: ctx.file_path,
            file_size: ctx.file_size,
            digest: ctx.digest,
            status: ScanStatus::Error,
            risk_score: 0.0,
            confidence: 0.0,
            positives: 0,
            total_engines: 0,
            analysis_id: None,
            permalink: None,
            detections: Vec::new(),
            reasons: vec![reason.clone()],
            recommendations: Vec::new(),
            duration_ms: ctx.started.elapsed().as_millis() as u64,
            from_cache: false,
            scanned_at: ctx.scanned_at,
        };

        self.persist(&outcome);
        progress.failed(&reason);

        outcome
    }

    fn persist(&self, outcome: &ScanOutcome) {
        if let Err(e) = self.history.append(&outcome.to_record()) {
            log::error!(
                "Failed to record scan {} in history: {}",
                outcome.scan_id,
                e
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
