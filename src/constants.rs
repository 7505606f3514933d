//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change the default analysis endpoint or tuning, only edit this file.

/// Default remote analysis service URL (VirusTotal v3 compatible)
///
/// This is the fallback URL when no environment variable is set.
pub const DEFAULT_API_BASE: &str = "https://www.virustotal.com/api/v3";

/// Default permalink base for completed analyses
pub const DEFAULT_PERMALINK_BASE: &str = "https://www.virustotal.com/gui/file";

/// Default polling interval between analysis status queries (seconds)
pub const DEFAULT_POLL_INTERVAL: u64 = 10;

/// Default maximum number of polling attempts before timeout
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// Default cap on consecutive transient poll failures
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 5;

/// Free-tier request budget (requests per minute)
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 4;

/// Default upload size limit (MB) enforced before any bytes are sent
pub const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 32;

/// Default cache lifetime for clean verdicts (days)
pub const DEFAULT_CLEAN_CACHE_DAYS: i64 = 3;

/// Default cache lifetime for threat verdicts (days)
pub const DEFAULT_THREAT_CACHE_DAYS: i64 = 30;

/// Default confidence threshold above which a cached verdict is
/// authoritative (0-100)
pub const DEFAULT_TRUST_THRESHOLD: f64 = 80.0;

/// Default maximum number of retained scan history records
pub const DEFAULT_HISTORY_RETENTION: usize = 1000;

/// Default quarantine storage cap (MB)
pub const DEFAULT_MAX_QUARANTINE_SIZE_MB: u64 = 500;

/// Grace period before a pending quarantine row counts as stale (seconds)
pub const DEFAULT_PENDING_GRACE_SECS: i64 = 600;

/// Bytes of file prefix inspected by the local heuristic analyzer
pub const DEFAULT_HEURISTIC_SAMPLE_BYTES: usize = 512 * 1024;

/// HTTP request timeout (seconds), sized for multipart uploads
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "DropGuard";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get remote analysis service URL from environment or use default
pub fn get_api_base() -> String {
    std::env::var("DROPGUARD_API_BASE")
        .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
}

/// Get permalink base from environment or use default
pub fn get_permalink_base() -> String {
    std::env::var("DROPGUARD_PERMALINK_BASE")
        .unwrap_or_else(|_| DEFAULT_PERMALINK_BASE.to_string())
}

/// Get remote analysis API key from environment (empty = not configured)
pub fn get_api_key() -> String {
    std::env::var("DROPGUARD_API_KEY").unwrap_or_default()
}

/// Get polling interval from environment or use default
pub fn get_poll_interval() -> u64 {
    std::env::var("DROPGUARD_POLL_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_POLL_INTERVAL)
}

/// Get maximum polling attempts from environment or use default
pub fn get_max_poll_attempts() -> u32 {
    std::env::var("DROPGUARD_MAX_POLL_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_POLL_ATTEMPTS)
}

/// Get the cached-verdict trust threshold from environment or use default
pub fn get_trust_threshold() -> f64 {
    std::env::var("DROPGUARD_TRUST_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TRUST_THRESHOLD)
}

/// Get clean-verdict cache lifetime (days) from environment or use default
pub fn get_clean_cache_days() -> i64 {
    std::env::var("DROPGUARD_CLEAN_CACHE_DAYS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CLEAN_CACHE_DAYS)
}

/// Get threat-verdict cache lifetime (days) from environment or use default
pub fn get_threat_cache_days() -> i64 {
    std::env::var("DROPGUARD_THREAT_CACHE_DAYS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_THREAT_CACHE_DAYS)
}

/// Get history retention cap from environment or use default
pub fn get_history_retention() -> usize {
    std::env::var("DROPGUARD_HISTORY_RETENTION")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_HISTORY_RETENTION)
}

/// Get quarantine storage cap (MB) from environment or use default
pub fn get_max_quarantine_size_mb() -> u64 {
    std::env::var("DROPGUARD_MAX_QUARANTINE_SIZE_MB")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_QUARANTINE_SIZE_MB)
}

/// Get upload size cap (MB) from environment or use default
pub fn get_max_upload_size_mb() -> u64 {
    std::env::var("DROPGUARD_MAX_UPLOAD_SIZE_MB")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE_MB)
}

/// Check if remote scanning is enabled
pub fn is_remote_scan_enabled() -> bool {
    std::env::var("DROPGUARD_REMOTE_SCAN_ENABLED")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}
