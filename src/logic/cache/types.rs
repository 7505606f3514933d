//! Verdict cache types

use serde::{Deserialize, Serialize};

/// Classification of a completed scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Clean,
    Threat,
    Error,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Clean => "clean",
            VerdictKind::Threat => "threat",
            VerdictKind::Error => "error",
        }
    }
}

/// The portion of a verdict serialized into the cache row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVerdict {
    pub kind: VerdictKind,
    pub positives: u32,
    pub total_engines: u32,
}

/// A cache row together with its derived confidence.
///
/// Confidence is recomputed from the row's facts on every lookup and is
/// never written back, so decay holds across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub digest: String,
    pub file_name: String,
    pub file_size: u64,
    pub kind: VerdictKind,
    pub positives: u32,
    pub total_engines: u32,
    pub cached_at: i64,
    pub expires_at: i64,
    pub confidence: f64,
    pub hit_count: u32,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&VerdictKind::Threat).unwrap(), "\"threat\"");
        assert_eq!(serde_json::to_string(&VerdictKind::Clean).unwrap(), "\"clean\"");
    }

    #[test]
    fn test_stored_verdict_round_trip() {
        let v = StoredVerdict {
            kind: VerdictKind::Threat,
            positives: 12,
            total_engines: 70,
        };
        let json = serde_json::to_string(&v).unwrap();
        let back: StoredVerdict = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, VerdictKind::Threat);
        assert_eq!(back.positives, 12);
        assert_eq!(back.total_engines, 70);
    }
}
