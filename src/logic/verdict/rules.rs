//! Verdict Weighting Rules
//!
//! Weights, saturations and classification thresholds for the aggregator.
//! The remote engine consensus dominates; local heuristics can escalate
//! but never outvote a broad remote detection on their own.

/// Weight of the remote positive-engine signal
pub const REMOTE_WEIGHT: f64 = 0.6;

/// Weight of the summed content/name marker signal
pub const MARKER_WEIGHT: f64 = 0.2;

/// Weight of the packer/obfuscation flag
pub const PACKER_WEIGHT: f64 = 0.1;

/// Weight of the reputation signal (masquerade, signature state)
pub const REPUTATION_WEIGHT: f64 = 0.1;

/// Positive engines at which the count component saturates
pub const POSITIVES_SATURATION: f64 = 10.0;

/// Detection ratio at which the ratio component saturates
pub const RATIO_SATURATION: f64 = 0.5;

/// Summed marker weight at which the marker signal saturates
pub const MARKER_SATURATION: f64 = 0.5;

/// Default classification thresholds over the 0..1 risk score
pub const SUSPICIOUS_MIN: f64 = 0.15;
pub const MALICIOUS_MIN: f64 = 0.4;
pub const CRITICAL_MIN: f64 = 0.7;

/// Minimum aggregate confidence for a critical classification
pub const CRITICAL_CONFIDENCE_MIN: f64 = 60.0;

/// Tunable classification thresholds
#[derive(Debug, Clone)]
pub struct RiskThresholds {
    pub suspicious_min: f64,
    pub malicious_min: f64,
    pub critical_min: f64,
    pub critical_confidence_min: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            suspicious_min: SUSPICIOUS_MIN,
            malicious_min: MALICIOUS_MIN,
            critical_min: CRITICAL_MIN,
            critical_confidence_min: CRITICAL_CONFIDENCE_MIN,
        }
    }
}

impl RiskThresholds {
    /// Flag earlier, at the cost of more false positives
    pub fn high_sensitivity() -> Self {
        Self {
            suspicious_min: 0.10,
            malicious_min: 0.30,
            critical_min: 0.60,
            ..Default::default()
        }
    }

    /// Flag later, for noisy environments
    pub fn low_sensitivity() -> Self {
        Self {
            suspicious_min: 0.25,
            malicious_min: 0.50,
            critical_min: 0.85,
            ..Default::default()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
