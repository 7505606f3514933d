//! Cached-verdict confidence model
//!
//! Pure functions from a cache row's facts to a 0-100 confidence score.
//! For a fixed hit count, confidence decreases as time moves toward the
//! row's expiry; repeated confirmations raise it but saturate. A verdict
//! backed by more engines starts from a higher base, and threat verdicts
//! start higher than clean ones at equal coverage.

use super::types::VerdictKind;

/// Weight of the age term in the blended decay factor
pub const AGE_WEIGHT: f64 = 0.75;

/// Weight of the hit-count term in the blended decay factor
pub const HIT_WEIGHT: f64 = 0.25;

/// Hit count at which the hit factor reaches half saturation
pub const HIT_HALF_SATURATION: f64 = 3.0;

/// Engine coverage treated as full (typical multi-engine population)
pub const FULL_COVERAGE_ENGINES: f64 = 70.0;

/// Base confidence floor/span for threat verdicts
pub const THREAT_BASE_MIN: f64 = 90.0;
pub const THREAT_BASE_SPAN: f64 = 10.0;

/// Base confidence floor/span for clean verdicts
pub const CLEAN_BASE_MIN: f64 = 70.0;
pub const CLEAN_BASE_SPAN: f64 = 15.0;

/// Fraction of the engine population that reported, clamped to [0, 1]
pub fn coverage(total_engines: u32) -> f64 {
    (total_engines as f64 / FULL_COVERAGE_ENGINES).clamp(0.0, 1.0)
}

/// Base confidence by verdict kind and engine coverage.
///
/// Error verdicts are never cached, so their base is zero.
pub fn base_confidence(kind: VerdictKind, total_engines: u32) -> f64 {
    let cov = coverage(total_engines);
    match kind {
        VerdictKind::Threat => THREAT_BASE_MIN + THREAT_BASE_SPAN * cov,
        VerdictKind::Clean => CLEAN_BASE_MIN + CLEAN_BASE_SPAN * cov,
        VerdictKind::Error => 0.0,
    }
}

/// Linear decay from 1 at cache time to 0 at expiry, clamped outside
pub fn age_factor(now: i64, cached_at: i64, expires_at: i64) -> f64 {
    if expires_at <= cached_at {
        return 0.0;
    }
    let lifetime = (expires_at - cached_at) as f64;
    let elapsed = (now - cached_at) as f64;
    (1.0 - elapsed / lifetime).clamp(0.0, 1.0)
}

/// Saturating confirmation factor: 0 at no hits, approaching 1
pub fn hit_factor(hit_count: u32) -> f64 {
    let hits = hit_count as f64;
    hits / (hits + HIT_HALF_SATURATION)
}

/// Full confidence score (0-100) for a cache row at `now`
pub fn confidence(
    kind: VerdictKind,
    total_engines: u32,
    hit_count: u32,
    cached_at: i64,
    expires_at: i64,
    now: i64,
) -> f64 {
    let base = base_confidence(kind, total_engines);
    let decay = AGE_WEIGHT * age_factor(now, cached_at, expires_at)
        + HIT_WEIGHT * hit_factor(hit_count);
    (base * decay).clamp(0.0, 100.0)
}

// ============================================================================
// TESTS
// ============================================================================
