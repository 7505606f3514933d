//! Scan Progress Events
//!
//! Each scan gets its own bounded channel of events. Senders never block:
//! when the observer is slow or gone the event is dropped and the scan
//! carries on. Percent values are monotonically non-decreasing across the
//! whole scan and the stream ends with a terminal completed/failed event.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

/// Capacity of a per-scan event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Pipeline stage a progress value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Hashing,
    CacheLookup,
    Analyzing,
    Uploading,
    Queued,
    Polling,
    Finalizing,
}

impl ScanStage {
    /// Global percent window of each stage. Windows are ordered and
    /// non-overlapping, which keeps whole-scan progress monotone.
    fn window(&self) -> (u8, u8) {
        match self {
            ScanStage::Hashing => (0, 10),
            ScanStage::CacheLookup => (10, 15),
            ScanStage::Analyzing => (15, 20),
            ScanStage::Uploading => (20, 55),
            ScanStage::Queued => (55, 60),
            ScanStage::Polling => (60, 95),
            ScanStage::Finalizing => (95, 100),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress { stage: ScanStage, percent: u8 },
    Completed { scan_id: String, status: String },
    Failed { reason: String },
}

/// Non-blocking sender half of a scan's event channel.
///
/// Clones share the same high-water mark, so progress stays monotone even
/// when several tasks report for one scan.
#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ScanEvent>>,
    high_water: Arc<Mutex<u8>>,
}

impl ProgressSender {
    /// New channel for an observed scan
    pub fn channel() -> (ProgressSender, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                tx: Some(tx),
                high_water: Arc::new(Mutex::new(0)),
            },
            rx,
        )
    }

    /// Sender for an unobserved scan; every emit is a no-op
    pub fn disabled() -> ProgressSender {
        Self {
            tx: None,
            high_water: Arc::new(Mutex::new(0)),
        }
    }

    /// Report progress within a stage, `fraction` in [0, 1]
    pub fn emit_stage(&self, stage: ScanStage, fraction: f32) {
        let (base, end) = stage.window();
        let span = (end - base) as f32;
        let raw = (base as f32 + span * fraction.clamp(0.0, 1.0)) as u8;

        let percent = {
            let mut high = self.high_water.lock();
            let p = raw.min(100).max(*high);
            *high = p;
            p
        };

        self.send(ScanEvent::Progress { stage, percent });
    }

    pub fn completed(&self, scan_id: &str, status: &str) {
        self.send(ScanEvent::Completed {
            scan_id: scan_id.to_string(),
            status: status.to_string(),
        });
    }

    pub fn failed(&self, reason: &str) {
        self.send(ScanEvent::Failed {
            reason: reason.to_string(),
        });
    }

    fn send(&self, event: ScanEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(event) {
                log::debug!("Progress event dropped: {}", e);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
