//! API v1 Module
//!
//! Re-exports the current stable API commands for versioning.
//! This allows future versions (v2, v3) to coexist.

// Re-export all commands from parent module
pub use super::commands::*;
