//! Content Hasher
//!
//! Derives the stable content identity of a file: SHA-256 over the full
//! byte stream, rendered as lowercase hex. Identical bytes produce an
//! identical digest regardless of path or name. Files are read in bounded
//! chunks so large files never sit in memory whole.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file by streaming its contents.
///
/// Fails with the underlying I/O error if the file disappears or becomes
/// unreadable mid-stream.
pub fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash an in-memory buffer
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a file on the blocking pool so the async runtime is never stalled
pub async fn digest_file_async(path: &Path) -> std::io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || digest_file(&path))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

// ============================================================================
// TESTS
// ============================================================================
