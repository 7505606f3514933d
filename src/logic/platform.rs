//! Platform Paths
//!
//! Per-platform selection of storage locations, kept in one place so the
//! rest of the core never branches on the OS. The quarantine root lives
//! under the app data root, outside any user-watched scan directory.

use std::path::PathBuf;

use crate::constants;

const QUARANTINE_FOLDER: &str = "Quarantine";
const DATABASE_FILE: &str = "dropguard.db";

/// App data root (platform local-data dir, falling back to the working dir)
pub fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(constants::APP_NAME)
}

/// Isolated quarantine storage root
pub fn quarantine_root() -> PathBuf {
    data_root().join(QUARANTINE_FOLDER)
}

/// Path of the SQLite database file
pub fn database_path() -> PathBuf {
    data_root().join(DATABASE_FILE)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarantine_root_is_under_data_root() {
        assert!(quarantine_root().starts_with(data_root()));
    }

    #[test]
    fn test_data_root_ends_with_app_name() {
        assert!(data_root().ends_with(constants::APP_NAME));
    }
}
