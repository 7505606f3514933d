//! Verdict Aggregator
//!
//! Merges remote engine consensus, cached verdicts and local heuristics
//! into a single classified verdict.
//!
//! Features:
//! - Weighted risk score over four signals (remote, markers, packer, reputation)
//! - Human-readable reasons for every contributing signal
//! - Aggregate confidence that discounts decayed cache evidence
//! - Low-confidence guard that downgrades critical classifications

mod rules;
mod types;

pub use rules::RiskThresholds;
pub use types::{AggregatedVerdict, ScoreBreakdown, ThreatLevel};

use crate::logic::cache::CachedVerdict;
use crate::logic::heuristics::{FileKind, HeuristicReport, SignatureStatus};
use crate::logic::remote::RemoteScanReport;

use rules::{
    MARKER_SATURATION, MARKER_WEIGHT, PACKER_WEIGHT, POSITIVES_SATURATION, RATIO_SATURATION,
    REMOTE_WEIGHT, REPUTATION_WEIGHT,
};

// ============================================================================
// CONFIDENCE MODEL
// ============================================================================

/// Confidence granted by having run local heuristics at all
const HEURISTIC_CONFIDENCE: f64 = 30.0;

/// Confidence granted by a fresh remote report; cached verdicts earn a
/// fraction of this scaled by their own decayed confidence
const REMOTE_CONFIDENCE: f64 = 55.0;

/// Bonus when the signature check actually ran on an executable
const SIGNATURE_CONFIDENCE: f64 = 10.0;

/// Bonus when content bytes were sampled (not an empty or unreadable file)
const SAMPLE_CONFIDENCE: f64 = 5.0;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Map a risk score to a threat level using the given thresholds
pub fn classify(score: f64, thresholds: &RiskThresholds) -> ThreatLevel {
    if score >= thresholds.critical_min {
        ThreatLevel::Critical
    } else if score >= thresholds.malicious_min {
        ThreatLevel::Malicious
    } else if score >= thresholds.suspicious_min {
        ThreatLevel::Suspicious
    } else {
        ThreatLevel::Clean
    }
}

/// Merge all available evidence for one file into a final verdict.
///
/// A fresh remote report takes precedence over a cached verdict. Heuristics
/// are always present; they escalate weak remote evidence and stand alone
/// when remote scanning is unavailable.
pub fn aggregate(
    remote: Option<&RemoteScanReport>,
    cached: Option<&CachedVerdict>,
    heuristics: &HeuristicReport,
    thresholds: &RiskThresholds,
) -> AggregatedVerdict {
    let mut reasons: Vec<String> = Vec::new();

    // Remote signal: fresh report preferred, cached verdict as fallback
    let (positives, total_engines, from_cache) = match (remote, cached) {
        (Some(report), _) => (report.positives, report.total_engines, false),
        (None, Some(entry)) => (entry.positives, entry.total_engines, true),
        (None, None) => (0, 0, false),
    };
    let has_engine_evidence = remote.is_some() || cached.is_some();

    let remote_contribution = REMOTE_WEIGHT * remote_signal(positives, total_engines);

    if has_engine_evidence {
        let source = if from_cache { " (cached)" } else { "" };
        if positives > 0 {
            reasons.push(format!(
                "Detected by {}/{} engines{}",
                positives, total_engines, source
            ));
        } else {
            reasons.push(format!(
                "No detections across {} engines{}",
                total_engines, source
            ));
        }
    }

    // Content and filename markers
    let marker_sum = heuristics.marker_weight();
    let marker_signal = (marker_sum / MARKER_SATURATION).min(1.0);
    let marker_contribution = MARKER_WEIGHT * marker_signal;

    if !heuristics.markers.is_empty() {
        let ids: Vec<&str> = heuristics.markers.iter().map(|m| m.id.as_str()).collect();
        reasons.push(format!("Suspicious markers: {}", ids.join(", ")));
    }

    // Packed or obfuscated executable
    let packer_contribution = if heuristics.packed_executable {
        reasons.push(format!(
            "Executable with high-entropy content ({:.2}), likely packed",
            heuristics.entropy
        ));
        PACKER_WEIGHT
    } else {
        0.0
    };

    // Reputation: masquerade, extension mismatch, missing signature
    let mut reputation_signal: f64 = 0.0;
    if heuristics.executable_masquerade {
        reputation_signal = 1.0;
        reasons.push("Executable disguised with a non-executable extension".to_string());
    } else if heuristics.extension_mismatch {
        reputation_signal = 0.3;
        reasons.push("File content does not match its extension".to_string());
    }
    if heuristics.sniffed_kind == FileKind::WindowsExecutable
        && heuristics.signature == SignatureStatus::Missing
    {
        reputation_signal = reputation_signal.max(0.4);
        reasons.push("Windows executable carries no digital signature".to_string());
    }
    let reputation_contribution = REPUTATION_WEIGHT * reputation_signal;

    let mut final_score = (remote_contribution
        + marker_contribution
        + packer_contribution
        + reputation_contribution)
        .clamp(0.0, 1.0);

    // The EICAR test file must always classify as at least malicious
    if heuristics.eicar {
        final_score = final_score.max(thresholds.malicious_min);
        reasons.push("Antivirus test file signature present".to_string());
    }

    // Confidence in the verdict, independent of the score itself
    let mut confidence = HEURISTIC_CONFIDENCE;
    if remote.is_some() {
        confidence += REMOTE_CONFIDENCE;
    } else if let Some(entry) = cached {
        confidence += REMOTE_CONFIDENCE * (entry.confidence / 100.0);
    }
    if heuristics.signature != SignatureStatus::NotApplicable {
        confidence += SIGNATURE_CONFIDENCE;
    }
    if heuristics.sample_bytes > 0 {
        confidence += SAMPLE_CONFIDENCE;
    }
    confidence = confidence.min(100.0);

    let mut threat_level = classify(final_score, thresholds);

    // A critical call needs solid evidence behind it
    if threat_level == ThreatLevel::Critical && confidence < thresholds.critical_confidence_min {
        threat_level = ThreatLevel::Malicious;
        reasons.push(format!(
            "Confidence {:.0} below {:.0}, downgraded to malicious",
            confidence, thresholds.critical_confidence_min
        ));
    }

    reasons.push(format!(
        "Final score: {:.2}, confidence: {:.0}",
        final_score, confidence
    ));

    let unsigned_executable = heuristics.signature == SignatureStatus::Missing;
    let recommendations = recommend(threat_level, positives, unsigned_executable);

    AggregatedVerdict {
        threat_level,
        risk_score: final_score,
        confidence,
        positives,
        total_engines,
        reasons,
        recommendations,
        breakdown: ScoreBreakdown {
            remote_contribution,
            marker_contribution,
            packer_contribution,
            reputation_contribution,
            final_score,
        },
    }
}

/// Verdict for a trusted cache hit; no fresh evidence is gathered.
///
/// The entry's own decayed confidence is the aggregate confidence, and
/// the score carries only the engine-consensus signal.
pub fn aggregate_cached(entry: &CachedVerdict, thresholds: &RiskThresholds) -> AggregatedVerdict {
    let positives = entry.positives;
    let total_engines = entry.total_engines;

    let remote_contribution = REMOTE_WEIGHT * remote_signal(positives, total_engines);
    let final_score = remote_contribution.clamp(0.0, 1.0);
    let confidence = entry.confidence.clamp(0.0, 100.0);

    let mut reasons = vec![format!(
        "Trusted cached verdict: {}/{} engines, confidence {:.0}",
        positives, total_engines, confidence
    )];

    let mut threat_level = classify(final_score, thresholds);
    if threat_level == ThreatLevel::Critical && confidence < thresholds.critical_confidence_min {
        threat_level = ThreatLevel::Malicious;
        reasons.push(format!(
            "Confidence {:.0} below {:.0}, downgraded to malicious",
            confidence, thresholds.critical_confidence_min
        ));
    }

    reasons.push(format!(
        "Final score: {:.2}, confidence: {:.0}",
        final_score, confidence
    ));

    let recommendations = recommend(threat_level, positives, false);

    AggregatedVerdict {
        threat_level,
        risk_score: final_score,
        confidence,
        positives,
        total_engines,
        reasons,
        recommendations,
        breakdown: ScoreBreakdown {
            remote_contribution,
            marker_contribution: 0.0,
            packer_contribution: 0.0,
            reputation_contribution: 0.0,
            final_score,
        },
    }
}

// ============================================================================
// SIGNALS AND RECOMMENDATIONS
// ============================================================================

/// Engine-consensus signal in 0..1, saturating on either the raw positive
/// count or the detection ratio, whichever is stronger
fn remote_signal(positives: u32, total_engines: u32) -> f64 {
    if positives == 0 {
        return 0.0;
    }
    let by_count = (positives as f64 / POSITIVES_SATURATION).min(1.0);
    let ratio = if total_engines > 0 {
        positives as f64 / total_engines as f64
    } else {
        0.0
    };
    let by_ratio = (ratio / RATIO_SATURATION).min(1.0);
    by_count.max(by_ratio)
}

fn recommend(level: ThreatLevel, positives: u32, unsigned_executable: bool) -> Vec<String> {
    let mut out = Vec::new();
    match level {
        ThreatLevel::Critical | ThreatLevel::Malicious => {
            out.push("Quarantine the file immediately".to_string());
            out.push("Do not execute the file".to_string());
            if positives > 0 {
                out.push("Review the engine detections before restoring".to_string());
            }
        }
        ThreatLevel::Suspicious => {
            out.push("Keep the file isolated until it can be verified".to_string());
            if unsigned_executable {
                out.push("Verify the publisher, the executable is unsigned".to_string());
            }
        }
        ThreatLevel::Clean => {}
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cache::VerdictKind;
    use crate::logic::heuristics::MarkerHit;

    fn benign_report() -> HeuristicReport {
        HeuristicReport {
            entropy: 4.1,
            packed_executable: false,
            sniffed_kind: FileKind::Unknown,
            extension_mismatch: false,
            executable_masquerade: false,
            signature: SignatureStatus::NotApplicable,
            markers: Vec::new(),
            eicar: false,
            sample_bytes: 4096,
        }
    }

    fn remote_report(positives: u32, total: u32) -> RemoteScanReport {
        RemoteScanReport {
            positives,
            total_engines: total,
            detections: Vec::new(),
            permalink: "https://example.test/gui/file/abc".to_string(),
            analysis_id: "an-1".to_string(),
            sha256: "abc".to_string(),
        }
    }

    fn marker(id: &str, weight: f64) -> MarkerHit {
        MarkerHit {
            id: id.to_string(),
            description: String::new(),
            weight,
        }
    }

    #[test]
    fn test_clean_remote_report_is_clean() {
        let remote = remote_report(0, 70);
        let verdict = aggregate(
            Some(&remote),
            None,
            &benign_report(),
            &RiskThresholds::default(),
        );

        assert_eq!(verdict.threat_level, ThreatLevel::Clean);
        assert!(!verdict.threat_level.is_threat());
        assert!(verdict.risk_score < 0.15);
        assert!(verdict.confidence >= 80.0);
        assert!(verdict.recommendations.is_empty());
        assert!(verdict.reasons.iter().any(|r| r.contains("No detections")));
    }

    #[test]
    fn test_broad_remote_detection_is_malicious() {
        let remote = remote_report(30, 70);
        let verdict = aggregate(
            Some(&remote),
            None,
            &benign_report(),
            &RiskThresholds::default(),
        );

        assert_eq!(verdict.threat_level, ThreatLevel::Malicious);
        assert_eq!(verdict.positives, 30);
        assert!((verdict.breakdown.remote_contribution - 0.6).abs() < 1e-9);
        assert!(verdict
            .recommendations
            .iter()
            .any(|r| r.contains("Quarantine")));
    }

    #[test]
    fn test_full_corroboration_is_critical() {
        let remote = remote_report(45, 70);
        let mut report = benign_report();
        report.entropy = 7.8;
        report.packed_executable = true;
        report.sniffed_kind = FileKind::WindowsExecutable;
        report.executable_masquerade = true;
        report.signature = SignatureStatus::Missing;
        report.markers = vec![
            marker("injection_api", 0.20),
            marker("downloader", 0.15),
            marker("encoded_payload", 0.10),
            marker("shell_invoke", 0.08),
        ];

        let verdict = aggregate(Some(&remote), None, &report, &RiskThresholds::default());

        assert_eq!(verdict.threat_level, ThreatLevel::Critical);
        assert!(verdict.risk_score >= 0.9);
        assert!(verdict.confidence >= 60.0);
    }

    #[test]
    fn test_heuristics_escalate_clean_remote_report() {
        let remote = remote_report(0, 70);
        let mut report = benign_report();
        report.entropy = 7.6;
        report.packed_executable = true;
        report.sniffed_kind = FileKind::WindowsExecutable;
        report.executable_masquerade = true;
        report.markers = vec![marker("lolbin", 0.12), marker("embedded_url", 0.05)];

        let verdict = aggregate(Some(&remote), None, &report, &RiskThresholds::default());

        assert_eq!(verdict.threat_level, ThreatLevel::Suspicious);
        assert!(verdict.risk_score >= 0.15);
        assert!(verdict.risk_score < 0.4);
        assert!(verdict.reasons.iter().any(|r| r.contains("disguised")));
    }

    #[test]
    fn test_low_confidence_critical_is_downgraded() {
        let cached = CachedVerdict {
            digest: "d".repeat(64),
            file_name: "old.exe".to_string(),
            file_size: 1024,
            kind: VerdictKind::Threat,
            positives: 40,
            total_engines: 70,
            cached_at: 0,
            expires_at: 1,
            confidence: 20.0,
            hit_count: 1,
        };
        let mut report = benign_report();
        report.entropy = 7.9;
        report.packed_executable = true;
        report.sniffed_kind = FileKind::WindowsExecutable;
        report.executable_masquerade = true;
        report.signature = SignatureStatus::Missing;
        report.markers = vec![
            marker("injection_api", 0.20),
            marker("persistence_key", 0.12),
            marker("downloader", 0.15),
            marker("encoded_payload", 0.10),
        ];

        let verdict = aggregate(None, Some(&cached), &report, &RiskThresholds::default());

        // Score clears the critical bar but the evidence is a decayed cache
        // entry, so the guard steps the level back down.
        assert!(verdict.risk_score >= 0.7);
        assert!(verdict.confidence < 60.0);
        assert_eq!(verdict.threat_level, ThreatLevel::Malicious);
        assert!(verdict.reasons.iter().any(|r| r.contains("downgraded")));
        assert!(verdict.reasons.iter().any(|r| r.contains("(cached)")));
    }

    #[test]
    fn test_eicar_alone_is_malicious() {
        let mut report = benign_report();
        report.eicar = true;

        let verdict = aggregate(None, None, &report, &RiskThresholds::default());

        assert_eq!(verdict.threat_level, ThreatLevel::Malicious);
        assert!(verdict.reasons.iter().any(|r| r.contains("test file")));
    }

    #[test]
    fn test_cached_threat_verdict_stands_alone() {
        let cached = CachedVerdict {
            digest: "c".repeat(64),
            file_name: "seen.exe".to_string(),
            file_size: 4096,
            kind: VerdictKind::Threat,
            positives: 40,
            total_engines: 70,
            cached_at: 0,
            expires_at: 1,
            confidence: 88.0,
            hit_count: 5,
        };

        let verdict = aggregate_cached(&cached, &RiskThresholds::default());

        assert_eq!(verdict.threat_level, ThreatLevel::Malicious);
        assert_eq!(verdict.positives, 40);
        assert_eq!(verdict.confidence, 88.0);
        assert!(verdict.reasons.iter().any(|r| r.contains("Trusted cached")));
        assert!(verdict
            .recommendations
            .iter()
            .any(|r| r.contains("Quarantine")));
    }

    #[test]
    fn test_cached_clean_verdict_stands_alone() {
        let cached = CachedVerdict {
            digest: "c".repeat(64),
            file_name: "seen.pdf".to_string(),
            file_size: 4096,
            kind: VerdictKind::Clean,
            positives: 0,
            total_engines: 70,
            cached_at: 0,
            expires_at: 1,
            confidence: 82.0,
            hit_count: 2,
        };

        let verdict = aggregate_cached(&cached, &RiskThresholds::default());

        assert_eq!(verdict.threat_level, ThreatLevel::Clean);
        assert_eq!(verdict.risk_score, 0.0);
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn test_classify_ladder_boundaries() {
        let t = RiskThresholds::default();
        assert_eq!(classify(0.0, &t), ThreatLevel::Clean);
        assert_eq!(classify(0.14, &t), ThreatLevel::Clean);
        assert_eq!(classify(0.15, &t), ThreatLevel::Suspicious);
        assert_eq!(classify(0.4, &t), ThreatLevel::Malicious);
        assert_eq!(classify(0.7, &t), ThreatLevel::Critical);
        assert_eq!(classify(1.0, &t), ThreatLevel::Critical);
    }

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::Clean < ThreatLevel::Suspicious);
        assert!(ThreatLevel::Suspicious < ThreatLevel::Malicious);
        assert!(ThreatLevel::Malicious < ThreatLevel::Critical);
    }
}
