//! Logic Module - Scan Engines & Stores
//!
//! Everything the scan flow is built from: hashing, the verdict cache,
//! local heuristics, remote orchestration, aggregation, and the stores
//! that keep quarantine and history state.

// Foundation
pub mod config;
pub mod events;
pub mod platform;
pub mod storage;

// Scan flow
pub mod cache;
pub mod hasher;
pub mod heuristics;
pub mod pipeline;
pub mod remote;
pub mod verdict;

// Stores & telemetry
pub mod history;
pub mod perf;
pub mod quarantine;
