//! Remote analysis service types
//!
//! Wire DTOs for the VirusTotal-v3-shaped API, the error taxonomy of the
//! remote path, and the normalized report the rest of the core consumes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone)]
pub enum ScanApiError {
    NotConfigured,
    InvalidApiKey,
    RateLimited { retry_after: u64 },
    FileTooLarge { size: u64, limit: u64 },
    NotFound,
    Timeout { attempts: u32 },
    NetworkError { message: String },
    ParseError { message: String },
    Other { message: String },
}

impl fmt::Display for ScanApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanApiError::NotConfigured => {
                write!(f, "Remote analysis service is not configured")
            }
            ScanApiError::InvalidApiKey => write!(f, "API key rejected by the service"),
            ScanApiError::RateLimited { retry_after } => {
                write!(f, "Rate limited, retry after {}s", retry_after)
            }
            ScanApiError::FileTooLarge { size, limit } => {
                write!(f, "File of {} bytes exceeds upload limit of {} bytes", size, limit)
            }
            ScanApiError::NotFound => write!(f, "Analysis not found"),
            ScanApiError::Timeout { attempts } => {
                write!(f, "Analysis timed out after {} polling attempts", attempts)
            }
            ScanApiError::NetworkError { message } => write!(f, "Network error: {}", message),
            ScanApiError::ParseError { message } => {
                write!(f, "Unexpected response format: {}", message)
            }
            ScanApiError::Other { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ScanApiError {}

impl ScanApiError {
    /// Errors worth retrying within the polling loop. Everything else is
    /// authoritative and surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanApiError::NetworkError { .. } | ScanApiError::RateLimited { .. }
        )
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

/// `POST /files` response body
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub data: UploadData,
}

#[derive(Debug, Deserialize)]
pub struct UploadData {
    pub id: String,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
}

/// `GET /analyses/{id}` response body
#[derive(Debug, Deserialize)]
pub struct AnalysisResponse {
    pub data: AnalysisData,
    pub meta: Option<AnalysisMeta>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisData {
    pub id: String,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub attributes: AnalysisAttributes,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisAttributes {
    pub status: String,
    pub stats: Option<AnalysisStats>,
    pub results: Option<HashMap<String, EngineResult>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisStats {
    #[serde(default)]
    pub malicious: u32,
    #[serde(default)]
    pub suspicious: u32,
    #[serde(default)]
    pub undetected: u32,
    #[serde(default)]
    pub harmless: u32,
    #[serde(default)]
    pub timeout: u32,
    #[serde(rename = "type-unsupported", default)]
    pub type_unsupported: u32,
}

#[derive(Debug, Deserialize)]
pub struct EngineResult {
    pub category: String,
    pub engine_name: Option<String>,
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisMeta {
    pub file_info: Option<FileInfo>,
}

#[derive(Debug, Deserialize)]
pub struct FileInfo {
    pub sha256: Option<String>,
    pub size: Option<u64>,
}

/// Service-side lifecycle of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Queued,
    InProgress,
    Completed,
}

impl AnalysisStatus {
    /// Unknown status strings keep the poll loop waiting
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" => AnalysisStatus::Completed,
            "in-progress" => AnalysisStatus::InProgress,
            _ => AnalysisStatus::Queued,
        }
    }
}

// ============================================================================
// NORMALIZED REPORT
// ============================================================================

/// One engine's detection, kept only for malicious/suspicious categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineDetection {
    pub engine: String,
    pub result: String,
    pub category: String,
}

/// Normalized outcome of a completed remote analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteScanReport {
    pub positives: u32,
    pub total_engines: u32,
    pub detections: Vec<EngineDetection>,
    pub permalink: String,
    pub analysis_id: String,
    pub sha256: String,
}

impl RemoteScanReport {
    pub fn detection_ratio(&self) -> f64 {
        if self.total_engines == 0 {
            return 0.0;
        }
        self.positives as f64 / self.total_engines as f64
    }
}

/// Collapse a completed analysis response into the normalized report.
///
/// `local_digest` stands in when the service omits the file digest; the
/// permalink is derived from whichever digest ends up authoritative.
pub fn normalize_analysis(
    response: AnalysisResponse,
    analysis_id: &str,
    local_digest: &str,
    permalink_base: &str,
) -> RemoteScanReport {
    let attrs = response.data.attributes;
    let stats = attrs.stats.unwrap_or_default();

    let mut detections = Vec::new();
    if let Some(results) = attrs.results {
        for (key, engine_result) in results {
            if engine_result.category == "malicious" || engine_result.category == "suspicious" {
                detections.push(EngineDetection {
                    engine: engine_result.engine_name.unwrap_or(key),
                    result: engine_result
                        .result
                        .unwrap_or_else(|| engine_result.category.clone()),
                    category: engine_result.category,
                });
            }
        }
    }
    detections.sort_by(|a, b| a.engine.cmp(&b.engine));

    let sha256 = response
        .meta
        .and_then(|meta| meta.file_info)
        .and_then(|info| info.sha256)
        .unwrap_or_else(|| local_digest.to_string());

    RemoteScanReport {
        positives: stats.malicious + stats.suspicious,
        total_engines: stats.malicious + stats.suspicious + stats.undetected + stats.harmless,
        detections,
        permalink: format!("{}/{}", permalink_base, sha256),
        analysis_id: analysis_id.to_string(),
        sha256,
    }
}

// ============================================================================
// TESTS
// ============================================================================
