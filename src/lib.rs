//! DropGuard Core - Scan Orchestration Library
//!
//! The engine behind the DropGuard shell: hashes dropped files, consults a
//! local verdict cache, runs heuristics alongside a remote multi-engine
//! analysis service, aggregates everything into one verdict, and keeps
//! quarantine, history, and performance state on disk.
//!
//! Features:
//! - SHA-256 content identity with streaming hashing
//! - Verdict cache with confidence decay and trust threshold
//! - Local heuristics: entropy, type sniffing, byte markers, EICAR
//! - Remote orchestration with dedup, rate limiting, bounded polling
//! - Weighted verdict aggregation with plain-language reasons
//! - Quarantine store with restore, secure delete, consistency checks
//!
//! Construction is explicit: build a [`CoreConfig`], hand it to
//! [`CoreService::new`], and call the functions in [`api::commands`].

pub mod api;
pub mod constants;
pub mod logic;

use std::sync::Arc;

use logic::cache::VerdictCache;
use logic::heuristics::HeuristicAnalyzer;
use logic::history::HistoryStore;
use logic::perf::PerformanceMonitor;
use logic::pipeline::ScanPipeline;
use logic::quarantine::{QuarantineError, QuarantineManager};
use logic::remote::{AnalysisClient, ScanOrchestrator};
use logic::storage::{Database, StoreError};

pub use logic::config::CoreConfig;

// ============================================================================
// SERVICE
// ============================================================================

/// Failure while wiring the service together
#[derive(Debug)]
pub enum InitError {
    Store(StoreError),
    Quarantine(QuarantineError),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::Store(e) => write!(f, "Storage initialization failed: {}", e),
            InitError::Quarantine(e) => write!(f, "Quarantine initialization failed: {}", e),
        }
    }
}

impl std::error::Error for InitError {}

impl From<StoreError> for InitError {
    fn from(e: StoreError) -> Self {
        InitError::Store(e)
    }
}

impl From<QuarantineError> for InitError {
    fn from(e: QuarantineError) -> Self {
        InitError::Quarantine(e)
    }
}

/// One constructed instance of the core: owns the database and every
/// component built on it. All api commands borrow this.
pub struct CoreService {
    config: CoreConfig,
    pub(crate) cache: Arc<VerdictCache>,
    pub(crate) quarantine: Arc<QuarantineManager>,
    pub(crate) history: Arc<HistoryStore>,
    pub(crate) perf: Arc<PerformanceMonitor>,
    pub(crate) pipeline: Arc<ScanPipeline>,
}

impl CoreService {
    pub fn new(config: CoreConfig) -> Result<Self, InitError> {
        let db = Arc::new(Database::open(&config.database_path)?);
        let cache = Arc::new(VerdictCache::new(db.clone(), config.cache.clone()));
        let analyzer = HeuristicAnalyzer::new(config.heuristics.clone());
        let client = Arc::new(AnalysisClient::new(config.remote.clone()));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            client,
            cache.clone(),
            config.remote.clone(),
        ));
        let quarantine = Arc::new(QuarantineManager::new(db.clone(), config.quarantine.clone())?);
        let history = Arc::new(HistoryStore::new(db, config.history.clone())?);
        let perf = Arc::new(PerformanceMonitor::new());

        let pipeline = Arc::new(ScanPipeline::new(
            config.clone(),
            cache.clone(),
            analyzer,
            orchestrator,
            history.clone(),
            perf.clone(),
        ));

        log::info!(
            "Core service ready (database: {}, remote: {})",
            config.database_path.display(),
            if config.remote.enabled { "on" } else { "off" }
        );

        Ok(Self {
            config,
            cache,
            quarantine,
            history,
            perf,
            pipeline,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

/// Initialize logging from the environment; `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
