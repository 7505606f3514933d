//! Performance Monitor
//!
//! Records duration and throughput for each completed scan into a bounded
//! ring buffer and derives a coarse trend. Advisory only, never gates a
//! scan.
//!
//! Features:
//! - Fixed-capacity sample ring, oldest evicted
//! - Trend classification over a recent window (improving/stable/degrading)
//! - Report with averages and an advisory note when degrading

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Ring buffer capacity
const MAX_SAMPLES: usize = 256;

/// Number of recent samples considered for trend classification
const TREND_WINDOW: usize = 32;

/// Below this many samples the trend is always stable
const TREND_MIN_SAMPLES: usize = 4;

/// Relative change between window halves treated as a real shift
const TREND_TOLERANCE: f64 = 0.10;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PerfSample {
    pub scan_id: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub duration_ms: u64,
    pub throughput_mbps: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerfTrend {
    Improving,
    Stable,
    Degrading,
}

impl PerfTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerfTrend::Improving => "improving",
            PerfTrend::Stable => "stable",
            PerfTrend::Degrading => "degrading",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub sample_count: usize,
    pub avg_duration_ms: f64,
    pub avg_throughput_mbps: f64,
    pub trend: PerfTrend,
    pub advisory: Option<String>,
}

// ============================================================================
// PERFORMANCE MONITOR
// ============================================================================

pub struct PerformanceMonitor {
    samples: Mutex<VecDeque<PerfSample>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(MAX_SAMPLES)),
        }
    }

    /// Record one completed scan
    pub fn record(&self, scan_id: &str, file_name: &str, size_bytes: u64, duration_ms: u64) {
        let throughput_mbps = throughput(size_bytes, duration_ms);
        let sample = PerfSample {
            scan_id: scan_id.to_string(),
            file_name: file_name.to_string(),
            size_bytes,
            duration_ms,
            throughput_mbps,
            timestamp: Utc::now().timestamp(),
        };

        let mut samples = self.samples.lock();
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(sample);

        log::trace!(
            "Scan perf: {} in {}ms ({:.2} MB/s)",
            file_name,
            duration_ms,
            throughput_mbps
        );
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    /// Most recent samples, newest first
    pub fn recent_samples(&self, limit: usize) -> Vec<PerfSample> {
        let samples = self.samples.lock();
        samples.iter().rev().take(limit).cloned().collect()
    }

    /// Compare mean duration of the older half of the recent window
    /// against the newer half
    pub fn trend(&self) -> PerfTrend {
        let samples = self.samples.lock();
        let len = samples.len();
        if len < TREND_MIN_SAMPLES {
            return PerfTrend::Stable;
        }

        let start = len.saturating_sub(TREND_WINDOW);
        let window: Vec<f64> = samples
            .iter()
            .skip(start)
            .map(|s| s.duration_ms as f64)
            .collect();

        let mid = window.len() / 2;
        let older_mean = mean(&window[..mid]);
        let newer_mean = mean(&window[mid..]);
        if older_mean <= 0.0 {
            return PerfTrend::Stable;
        }

        let change = (newer_mean - older_mean) / older_mean;
        if change > TREND_TOLERANCE {
            PerfTrend::Degrading
        } else if change < -TREND_TOLERANCE {
            PerfTrend::Improving
        } else {
            PerfTrend::Stable
        }
    }

    pub fn report(&self) -> PerformanceReport {
        let trend = self.trend();

        let samples = self.samples.lock();
        let sample_count = samples.len();
        let (avg_duration_ms, avg_throughput_mbps) = if sample_count == 0 {
            (0.0, 0.0)
        } else {
            let duration: f64 = samples.iter().map(|s| s.duration_ms as f64).sum();
            let throughput: f64 = samples.iter().map(|s| s.throughput_mbps).sum();
            (
                duration / sample_count as f64,
                throughput / sample_count as f64,
            )
        };

        let advisory = if trend == PerfTrend::Degrading {
            Some(
                "Scan durations are trending up; check disk load and remote service latency"
                    .to_string(),
            )
        } else {
            None
        };

        PerformanceReport {
            sample_count,
            avg_duration_ms,
            avg_throughput_mbps,
            trend,
            advisory,
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn throughput(size_bytes: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    let mb = size_bytes as f64 / (1024.0 * 1024.0);
    mb / (duration_ms as f64 / 1000.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(monitor: &PerformanceMonitor, durations: &[u64]) {
        for (i, &duration) in durations.iter().enumerate() {
            monitor.record(&format!("s{}", i), "file.bin", 1024 * 1024, duration);
        }
    }

    #[test]
    fn test_throughput_computation() {
        // 10 MiB in 2 seconds
        assert!((throughput(10 * 1024 * 1024, 2000) - 5.0).abs() < 1e-9);
        assert_eq!(throughput(1024, 0), 0.0);
    }

    #[test]
    fn test_ring_buffer_caps_samples() {
        let monitor = PerformanceMonitor::new();
        for i in 0..(MAX_SAMPLES + 10) {
            monitor.record(&format!("s{}", i), "file.bin", 1024, 100);
        }

        assert_eq!(monitor.sample_count(), MAX_SAMPLES);

        // The earliest samples were evicted
        let newest = monitor.recent_samples(1);
        assert_eq!(newest[0].scan_id, format!("s{}", MAX_SAMPLES + 9));
    }

    #[test]
    fn test_trend_needs_minimum_samples() {
        let monitor = PerformanceMonitor::new();
        fill(&monitor, &[100, 500, 900]);
        assert_eq!(monitor.trend(), PerfTrend::Stable);
    }

    #[test]
    fn test_trend_degrading_when_durations_grow() {
        let monitor = PerformanceMonitor::new();
        fill(&monitor, &[100, 100, 100, 100, 200, 200, 200, 200]);

        assert_eq!(monitor.trend(), PerfTrend::Degrading);

        let report = monitor.report();
        assert_eq!(report.trend, PerfTrend::Degrading);
        assert!(report.advisory.is_some());
        assert!((report.avg_duration_ms - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_improving_when_durations_shrink() {
        let monitor = PerformanceMonitor::new();
        fill(&monitor, &[200, 200, 200, 200, 100, 100, 100, 100]);
        assert_eq!(monitor.trend(), PerfTrend::Improving);
    }

    #[test]
    fn test_trend_stable_within_tolerance() {
        let monitor = PerformanceMonitor::new();
        fill(&monitor, &[100, 102, 98, 100, 101, 99, 103, 100]);
        assert_eq!(monitor.trend(), PerfTrend::Stable);
    }

    #[test]
    fn test_report_on_empty_monitor() {
        let monitor = PerformanceMonitor::new();
        let report = monitor.report();

        assert_eq!(report.sample_count, 0);
        assert_eq!(report.avg_duration_ms, 0.0);
        assert_eq!(report.trend, PerfTrend::Stable);
        assert!(report.advisory.is_none());
    }
}
