//! Aggregated verdict types

use serde::{Deserialize, Serialize};

/// Overall classification of a scanned file, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Clean,
    Suspicious,
    Malicious,
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Clean => "clean",
            ThreatLevel::Suspicious => "suspicious",
            ThreatLevel::Malicious => "malicious",
            ThreatLevel::Critical => "critical",
        }
    }

    pub fn is_threat(&self) -> bool {
        matches!(self, ThreatLevel::Malicious | ThreatLevel::Critical)
    }
}

/// Per-signal contributions to the final risk score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub remote_contribution: f64,
    pub marker_contribution: f64,
    pub packer_contribution: f64,
    pub reputation_contribution: f64,
    pub final_score: f64,
}

/// Merged result of remote, cached and heuristic evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedVerdict {
    pub threat_level: ThreatLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub positives: u32,
    pub total_engines: u32,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

// ============================================================================
// TESTS
// ============================================================================
