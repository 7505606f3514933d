//! Core Configuration
//!
//! Plain configuration structs for the explicitly constructed components.
//! Defaults pull from `constants`, so environment overrides apply once at
//! construction time; tests build these structs directly with temp paths.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::platform;

/// Remote analysis service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub api_base: String,
    pub api_key: String,
    pub permalink_base: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub max_poll_failures: u32,
    pub rate_limit_per_minute: u32,
    pub max_upload_size_mb: u64,
    pub timeout_seconds: u64,
    pub enabled: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: constants::get_api_base(),
            api_key: constants::get_api_key(),
            permalink_base: constants::get_permalink_base(),
            poll_interval_secs: constants::get_poll_interval(),
            max_poll_attempts: constants::get_max_poll_attempts(),
            max_poll_failures: constants::DEFAULT_MAX_POLL_FAILURES,
            rate_limit_per_minute: constants::DEFAULT_RATE_LIMIT_PER_MINUTE,
            max_upload_size_mb: constants::get_max_upload_size_mb(),
            timeout_seconds: constants::DEFAULT_HTTP_TIMEOUT_SECS,
            enabled: constants::is_remote_scan_enabled(),
        }
    }
}

impl RemoteConfig {
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

/// Verdict cache lifetimes and trust threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub clean_ttl_days: i64,
    pub threat_ttl_days: i64,
    pub trust_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            clean_ttl_days: constants::get_clean_cache_days(),
            threat_ttl_days: constants::get_threat_cache_days(),
            trust_threshold: constants::get_trust_threshold(),
        }
    }
}

/// Heuristic analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    pub sample_bytes: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            sample_bytes: constants::DEFAULT_HEURISTIC_SAMPLE_BYTES,
        }
    }
}

/// Quarantine storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineConfig {
    pub root: PathBuf,
    pub max_total_size_mb: u64,
    pub pending_grace_secs: i64,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            root: platform::quarantine_root(),
            max_total_size_mb: constants::get_max_quarantine_size_mb(),
            pending_grace_secs: constants::DEFAULT_PENDING_GRACE_SECS,
        }
    }
}

impl QuarantineConfig {
    pub fn max_total_size_bytes(&self) -> u64 {
        self.max_total_size_mb * 1024 * 1024
    }
}

/// Scan history retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub retention: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention: constants::get_history_retention(),
        }
    }
}

/// Top-level configuration for the core service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub heuristics: HeuristicsConfig,
    pub quarantine: QuarantineConfig,
    pub history: HistoryConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: platform::database_path(),
            remote: RemoteConfig::default(),
            cache: CacheConfig::default(),
            heuristics: HeuristicsConfig::default(),
            quarantine: QuarantineConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
