//! Heuristic Analyzer
//!
//! Local static inspection of a file, independent of network access.
//!
//! Features:
//! - Shannon entropy over a bounded content sample (packer signal)
//! - Weighted suspicious-content markers and filename-shape signals
//! - Declared extension versus sniffed magic-byte type
//! - PE certificate table presence (structural, no validation)
//! - Antivirus test-string recognition
//!
//! Analysis is pure over the sampled bytes: identical input bytes and
//! name produce an identical report, and nothing here touches the cache
//! or history stores.

mod entropy;
mod filetype;
mod markers;

pub use entropy::{shannon_entropy, HIGH_ENTROPY_THRESHOLD};
pub use filetype::FileKind;
pub use markers::MarkerHit;

#[cfg(test)]
pub use markers::EICAR_TEST_BYTES;

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::logic::config::HeuristicsConfig;

/// Embedded-signature report for executable containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
    /// Not an executable, or headers beyond the sampled prefix
    NotApplicable,
    Missing,
    Present,
}

/// Fixed-shape result of local analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicReport {
    pub entropy: f32,
    pub packed_executable: bool,
    pub sniffed_kind: FileKind,
    pub extension_mismatch: bool,
    pub executable_masquerade: bool,
    pub signature: SignatureStatus,
    pub markers: Vec<MarkerHit>,
    pub eicar: bool,
    pub sample_bytes: usize,
}

impl HeuristicReport {
    /// Sum of matched marker weights, the aggregator's content signal
    pub fn marker_weight(&self) -> f64 {
        self.markers.iter().map(|m| m.weight).sum()
    }
}

#[derive(Clone)]
pub struct HeuristicAnalyzer {
    config: HeuristicsConfig,
}

impl HeuristicAnalyzer {
    pub fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    /// Analyze sampled bytes under a file name. Pure and deterministic.
    pub fn analyze_bytes(&self, file_name: &str, sample: &[u8]) -> HeuristicReport {
        let sniffed = filetype::sniff(sample);
        let extension = filetype::extension_of(file_name).unwrap_or_default();
        let entropy_value = entropy::shannon_entropy(sample);

        let mut hits = markers::scan_content(sample);
        hits.extend(markers::filename_signals(file_name));

        let signature = if sniffed == FileKind::WindowsExecutable {
            match filetype::pe_certificate_present(sample) {
                Some(true) => SignatureStatus::Present,
                Some(false) => SignatureStatus::Missing,
                None => SignatureStatus::NotApplicable,
            }
        } else {
            SignatureStatus::NotApplicable
        };

        HeuristicReport {
            entropy: entropy_value,
            packed_executable: sniffed.is_executable() && entropy::is_high_entropy(entropy_value),
            sniffed_kind: sniffed,
            extension_mismatch: filetype::extension_mismatch(sniffed, &extension),
            executable_masquerade: filetype::executable_masquerade(sniffed, &extension),
            signature,
            eicar: markers::contains_eicar(sample),
            sample_bytes: sample.len(),
            markers: hits,
        }
    }

    /// Read a bounded prefix of the file and analyze it
    pub fn analyze_file(&self, path: &Path) -> std::io::Result<HeuristicReport> {
        let file = std::fs::File::open(path)?;
        let mut sample = Vec::with_capacity(self.config.sample_bytes.min(64 * 1024));
        file.take(self.config.sample_bytes as u64)
            .read_to_end(&mut sample)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(self.analyze_bytes(&file_name, &sample))
    }

    /// File analysis on the blocking pool
    pub async fn analyze_file_async(&self, path: &Path) -> std::io::Result<HeuristicReport> {
        let analyzer = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || analyzer.analyze_file(&path))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn analyzer() -> HeuristicAnalyzer {
        HeuristicAnalyzer::new(HeuristicsConfig { sample_bytes: 64 * 1024 })
    }

    /// MZ header followed by a full byte spread, entropy close to 8.0
    fn packed_exe_sample() -> Vec<u8> {
        let mut sample = b"MZ".to_vec();
        sample.extend((0..=255u8).cycle().take(32 * 256));
        sample
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let sample = packed_exe_sample();
        let a = analyzer().analyze_bytes("dropper.exe", &sample);
        let b = analyzer().analyze_bytes("dropper.exe", &sample);
        assert_eq!(a, b);
    }

    #[test]
    fn test_packed_executable_flag() {
        let report = analyzer().analyze_bytes("dropper.exe", &packed_exe_sample());
        assert_eq!(report.sniffed_kind, FileKind::WindowsExecutable);
        assert!(report.packed_executable);

        let plain = analyzer().analyze_bytes("notes.txt", b"just some words");
        assert!(!plain.packed_executable);
    }

    #[test]
    fn test_masquerading_executable() {
        let report = analyzer().analyze_bytes("holiday.jpg", b"MZ\x90\x00rest of file");
        assert!(report.executable_masquerade);
        assert!(report.extension_mismatch);
    }

    #[test]
    fn test_eicar_forces_flag() {
        let report = analyzer().analyze_bytes("eicar.com", EICAR_TEST_BYTES);
        assert!(report.eicar);
    }

    #[test]
    fn test_marker_weight_sums_hits() {
        let report = analyzer()
            .analyze_bytes("run.ps1", b"powershell Invoke-WebRequest http://x.example/a");
        assert!(report.markers.len() >= 3);
        let expected: f64 = report.markers.iter().map(|m| m.weight).sum();
        assert!((report.marker_weight() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_file_sampling_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.bin");
        std::fs::write(&path, vec![7u8; 100_000]).unwrap();

        let small = HeuristicAnalyzer::new(HeuristicsConfig { sample_bytes: 1024 });
        let report = small.analyze_file(&path).unwrap();
        assert_eq!(report.sample_bytes, 1024);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(analyzer().analyze_file(&temp_dir.path().join("gone")).is_err());
    }
}
