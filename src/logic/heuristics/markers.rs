//! Suspicious Content Markers
//!
//! Static table of weighted byte patterns matched against the scanned
//! prefix of a file, plus filename-shape signals. Patterns compile once;
//! an invalid pattern is logged and skipped rather than taking the whole
//! table down.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

/// The standard antivirus test string. Its presence always scans as a
/// threat.
pub const EICAR_TEST_BYTES: &[u8] =
    b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

// ============================================================================
// MARKER TABLE
// ============================================================================

struct MarkerDef {
    id: &'static str,
    description: &'static str,
    weight: f64,
    pattern: &'static str,
}

const CONTENT_MARKER_DEFS: &[MarkerDef] = &[
    MarkerDef {
        id: "SHELL_INVOKE",
        description: "Command shell invocation strings",
        weight: 0.08,
        pattern: r"(?i)powershell|pwsh|cmd\.exe|cmd /c",
    },
    MarkerDef {
        id: "ENCODED_PAYLOAD",
        description: "Base64 payload decoding",
        weight: 0.10,
        pattern: r"(?i)frombase64string|-encodedcommand|base64 -d",
    },
    MarkerDef {
        id: "DOWNLOADER",
        description: "Download-and-execute strings",
        weight: 0.15,
        pattern: r"(?i)invoke-webrequest|downloadstring|downloadfile|certutil.{0,20}-urlcache|wget |curl ",
    },
    MarkerDef {
        id: "INJECTION_API",
        description: "Thread/memory injection APIs",
        weight: 0.20,
        pattern: r"(?i)createremotethread|virtualalloc|writeprocessmemory|ntunmapviewofsection",
    },
    MarkerDef {
        id: "LOLBIN",
        description: "Living-off-the-land binary names",
        weight: 0.12,
        pattern: r"(?i)rundll32|regsvr32|mshta|wscript|cscript|schtasks",
    },
    MarkerDef {
        id: "PERSISTENCE_KEY",
        description: "Autorun registry key paths",
        weight: 0.12,
        pattern: r"(?i)currentversion\\run|userinit|winlogon\\shell",
    },
    MarkerDef {
        id: "EMBEDDED_URL",
        description: "Embedded network endpoint",
        weight: 0.05,
        pattern: r"(?i)https?://",
    },
];

pub struct ContentMarker {
    pub id: &'static str,
    pub description: &'static str,
    pub weight: f64,
    pattern: Regex,
}

static CONTENT_MARKERS: Lazy<Vec<ContentMarker>> = Lazy::new(|| {
    CONTENT_MARKER_DEFS
        .iter()
        .filter_map(|def| match Regex::new(def.pattern) {
            Ok(pattern) => Some(ContentMarker {
                id: def.id,
                description: def.description,
                weight: def.weight,
                pattern,
            }),
            Err(e) => {
                log::error!("Invalid content marker '{}': {}", def.id, e);
                None
            }
        })
        .collect()
});

// ============================================================================
// FILENAME SIGNALS
// ============================================================================

const LURE_KEYWORDS: &[&str] = &[
    "crack", "keygen", "loader", "trojan", "stealer", "miner", "backdoor", "hacktool",
];

const EXECUTABLE_EXTS: &[&str] = &["exe", "scr", "bat", "cmd", "com", "pif"];

const DECOY_EXTS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png", "txt",
];

/// A matched marker, content- or name-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerHit {
    pub id: String,
    pub description: String,
    pub weight: f64,
}

/// Match every content marker against the sampled bytes, in table order
pub fn scan_content(sample: &[u8]) -> Vec<MarkerHit> {
    CONTENT_MARKERS
        .iter()
        .filter(|marker| marker.pattern.is_match(sample))
        .map(|marker| MarkerHit {
            id: marker.id.to_string(),
            description: marker.description.to_string(),
            weight: marker.weight,
        })
        .collect()
}

/// Whether the sample contains the antivirus test string
pub fn contains_eicar(sample: &[u8]) -> bool {
    let needle = EICAR_TEST_BYTES;
    sample.len() >= needle.len() && sample.windows(needle.len()).any(|window| window == needle)
}

/// `name.pdf.exe`-style decoy extension in front of an executable one
pub fn has_double_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    let parts: Vec<&str> = lower.split('.').collect();
    if parts.len() < 3 {
        return false;
    }

    let last = parts[parts.len() - 1];
    let decoy = parts[parts.len() - 2];
    EXECUTABLE_EXTS.contains(&last) && DECOY_EXTS.contains(&decoy)
}

/// Name-shape signals for a candidate file
pub fn filename_signals(name: &str) -> Vec<MarkerHit> {
    let mut hits = Vec::new();
    let lower = name.to_lowercase();

    if has_double_extension(name) {
        hits.push(MarkerHit {
            id: "NAME_DOUBLE_EXT".to_string(),
            description: "Decoy extension in front of an executable one".to_string(),
            weight: 0.25,
        });
    }

    if let Some(keyword) = LURE_KEYWORDS.iter().find(|k| lower.contains(*k)) {
        hits.push(MarkerHit {
            id: "NAME_LURE".to_string(),
            description: format!("Lure keyword '{}' in file name", keyword),
            weight: 0.10,
        });
    }

    if lower.starts_with('.') {
        hits.push(MarkerHit {
            id: "NAME_HIDDEN".to_string(),
            description: "Hidden-file name prefix".to_string(),
            weight: 0.05,
        });
    }

    hits
}

// ============================================================================
// TESTS
// ============================================================================
