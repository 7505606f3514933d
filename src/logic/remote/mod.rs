//! Remote Analysis
//!
//! Client, submission state machine and wire types for the multi-engine
//! analysis service.

mod client;
mod orchestrator;
mod types;

pub use client::AnalysisClient;
pub use orchestrator::ScanOrchestrator;
pub use types::{
    normalize_analysis, AnalysisResponse, AnalysisStatus, EngineDetection, RemoteScanReport,
    ScanApiError,
};
