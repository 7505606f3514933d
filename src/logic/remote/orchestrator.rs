//! Remote Scan Orchestrator
//!
//! Drives one submission through Uploading -> Queued -> Polling ->
//! Completed/Failed against the analysis service.
//!
//! Flow:
//! 1. Reject oversized files before reading a byte
//! 2. Stage file bytes with fractional upload progress
//! 3. Upload, then poll at a fixed interval up to a bounded attempt count
//! 4. Normalize the completed response and write the verdict cache
//!
//! Concurrent submissions for the same digest coalesce: the first caller
//! becomes the leader and spawns the remote job as a detached task, later
//! callers attach to its published outcome. Dropping every observer
//! cancels nothing; the job still finishes and caches its result.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::client::AnalysisClient;
use super::types::{
    normalize_analysis, AnalysisResponse, AnalysisStatus, RemoteScanReport, ScanApiError,
};
use crate::logic::cache::{StoredVerdict, VerdictCache, VerdictKind};
use crate::logic::config::RemoteConfig;
use crate::logic::events::{ProgressSender, ScanStage};

// ============================================================================
// IN-FLIGHT COALESCING
// ============================================================================

pub(crate) type JobSlot = Option<Result<RemoteScanReport, ScanApiError>>;

pub(crate) enum Role {
    Leader {
        tx: watch::Sender<JobSlot>,
        rx: watch::Receiver<JobSlot>,
    },
    Follower(watch::Receiver<JobSlot>),
}

/// Digest-keyed map of analyses currently in flight
pub(crate) struct InflightMap {
    jobs: Mutex<HashMap<String, watch::Receiver<JobSlot>>>,
}

impl InflightMap {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// First caller for a digest leads; later callers attach
    pub(crate) fn begin(&self, digest: &str) -> Role {
        let mut jobs = self.jobs.lock();
        if let Some(rx) = jobs.get(digest) {
            return Role::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        jobs.insert(digest.to_string(), rx.clone());
        Role::Leader { tx, rx }
    }

    pub(crate) fn finish(&self, digest: &str) {
        self.jobs.lock().remove(digest);
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().len()
    }
}

/// Wait for a job's published outcome
pub(crate) async fn wait_for_outcome(
    mut rx: watch::Receiver<JobSlot>,
) -> Result<RemoteScanReport, ScanApiError> {
    loop {
        {
            let slot = rx.borrow();
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
        }
        if rx.changed().await.is_err() {
            return Err(ScanApiError::Other {
                message: "Analysis task ended without publishing a result".to_string(),
            });
        }
    }
}

// ============================================================================
// POLLING
// ============================================================================

/// Progress estimate across the attempt budget, capped below completion
pub(crate) fn poll_fraction(attempt: u32, max_attempts: u32) -> f32 {
    if max_attempts == 0 {
        return 0.0;
    }
    (attempt as f32 / max_attempts as f32).min(0.95)
}

/// Poll `fetch` until the analysis completes or the budget runs out.
///
/// Only a successful status query consumes an attempt. Transient failures
/// are retried under a separate consecutive cap; authoritative errors
/// surface immediately. Exhausting `max_attempts` is a timeout, never a
/// verdict.
pub(crate) async fn drive_polling<F, Fut>(
    interval: Duration,
    max_attempts: u32,
    max_failures: u32,
    mut fetch: F,
    mut on_attempt: impl FnMut(u32),
) -> Result<AnalysisResponse, ScanApiError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<AnalysisResponse, ScanApiError>>,
{
    let mut attempts = 0u32;
    let mut consecutive_failures = 0u32;

    loop {
        if attempts >= max_attempts {
            return Err(ScanApiError::Timeout { attempts });
        }

        tokio::time::sleep(interval).await;

        match fetch().await {
            Ok(response) => {
                consecutive_failures = 0;
                attempts += 1;
                on_attempt(attempts);

                match AnalysisStatus::parse(&response.data.attributes.status) {
                    AnalysisStatus::Completed => return Ok(response),
                    status => {
                        log::debug!(
                            "Analysis {} still {:?} (attempt {}/{})",
                            response.data.id,
                            status,
                            attempts,
                            max_attempts
                        );
                    }
                }
            }
            Err(e) => {
                if !e.is_transient() {
                    return Err(e);
                }
                consecutive_failures += 1;
                log::warn!(
                    "Transient poll failure {}/{}: {}",
                    consecutive_failures,
                    max_failures,
                    e
                );
                if consecutive_failures >= max_failures {
                    return Err(e);
                }
                if let ScanApiError::RateLimited { retry_after } = &e {
                    tokio::time::sleep(Duration::from_secs(*retry_after)).await;
                }
            }
        }
    }
}

// ============================================================================
// REMOTE JOB
// ============================================================================

/// Read the file in chunks, reporting staging progress as upload fraction
async fn stage_file(path: &Path, progress: &ProgressSender) -> Result<Vec<u8>, ScanApiError> {
    let path = path.to_path_buf();
    let progress = progress.clone();

    tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ScanApiError> {
        let mut file = std::fs::File::open(&path)
            .map_err(|e| ScanApiError::Other { message: format!("Cannot open file: {}", e) })?;
        let total = file
            .metadata()
            .map_err(|e| ScanApiError::Other { message: format!("Cannot stat file: {}", e) })?
            .len();

        let mut staged = Vec::with_capacity(total as usize);
        let mut buffer = [0u8; 64 * 1024];

        loop {
            let bytes_read = file
                .read(&mut buffer)
                .map_err(|e| ScanApiError::Other { message: format!("Cannot read file: {}", e) })?;
            if bytes_read == 0 {
                break;
            }
            staged.extend_from_slice(&buffer[..bytes_read]);
            if total > 0 {
                // Hold the last slice of the window for the POST itself
                let fraction = 0.9 * staged.len() as f32 / total as f32;
                progress.emit_stage(ScanStage::Uploading, fraction);
            }
        }

        Ok(staged)
    })
    .await
    .map_err(|e| ScanApiError::Other { message: e.to_string() })?
}

/// The detached unit of remote work for one digest. Writes the verdict
/// cache itself on success, so the result is kept even when every
/// observer is gone.
async fn run_remote_job(
    client: Arc<AnalysisClient>,
    cache: Arc<VerdictCache>,
    config: RemoteConfig,
    path: PathBuf,
    digest: String,
    file_name: String,
    file_size: u64,
    progress: ProgressSender,
) -> Result<RemoteScanReport, ScanApiError> {
    client.check_upload_size(&path, file_size)?;

    progress.emit_stage(ScanStage::Uploading, 0.0);
    let bytes = stage_file(&path, &progress).await?;

    let analysis_id = client.upload(&file_name, bytes).await?;
    progress.emit_stage(ScanStage::Uploading, 1.0);
    log::info!("Uploaded {} as analysis {}", file_name, analysis_id);
    progress.emit_stage(ScanStage::Queued, 1.0);

    let max_attempts = config.max_poll_attempts;
    let response = drive_polling(
        Duration::from_secs(config.poll_interval_secs),
        config.max_poll_attempts,
        config.max_poll_failures,
        || client.fetch_analysis(&analysis_id),
        |attempt| progress.emit_stage(ScanStage::Polling, poll_fraction(attempt, max_attempts)),
    )
    .await?;

    let report = normalize_analysis(response, &analysis_id, &digest, &config.permalink_base);

    let kind = if report.positives > 0 {
        VerdictKind::Threat
    } else {
        VerdictKind::Clean
    };
    let stored = StoredVerdict {
        kind,
        positives: report.positives,
        total_engines: report.total_engines,
    };
    if let Err(e) = cache.store(&digest, &file_name, file_size, stored) {
        log::error!("Failed to cache verdict for {}: {}", digest, e);
    }

    Ok(report)
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct ScanOrchestrator {
    client: Arc<AnalysisClient>,
    cache: Arc<VerdictCache>,
    config: RemoteConfig,
    inflight: Arc<InflightMap>,
}

impl ScanOrchestrator {
    pub fn new(client: Arc<AnalysisClient>, cache: Arc<VerdictCache>, config: RemoteConfig) -> Self {
        Self {
            client,
            cache,
            config,
            inflight: Arc::new(InflightMap::new()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.config.enabled && self.client.is_configured()
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Submit a file for remote analysis, coalescing by content digest.
    ///
    /// The remote job runs detached: callers that stop observing do not
    /// abort it, and its verdict still lands in the cache.
    pub async fn scan(
        &self,
        path: &Path,
        digest: &str,
        file_name: &str,
        file_size: u64,
        progress: &ProgressSender,
    ) -> Result<RemoteScanReport, ScanApiError> {
        if !self.is_available() {
            return Err(ScanApiError::NotConfigured);
        }

        match self.inflight.begin(digest) {
            Role::Follower(rx) => {
                log::info!("Coalescing scan of {} into in-flight analysis", digest);
                wait_for_outcome(rx).await
            }
            Role::Leader { tx, rx } => {
                let client = Arc::clone(&self.client);
                let cache = Arc::clone(&self.cache);
                let config = self.config.clone();
                let inflight = Arc::clone(&self.inflight);
                let path = path.to_path_buf();
                let digest_owned = digest.to_string();
                let file_name = file_name.to_string();
                let progress = progress.clone();

                tokio::spawn(async move {
                    let outcome = run_remote_job(
                        client,
                        cache,
                        config,
                        path,
                        digest_owned.clone(),
                        file_name,
                        file_size,
                        progress,
                    )
                    .await;

                    if let Err(e) = &outcome {
                        log::warn!("Remote analysis for {} failed: {}", digest_owned, e);
                    }

                    // Publish before releasing the digest so attached
                    // waiters observe the result
                    let _ = tx.send(Some(outcome));
                    inflight.finish(&digest_owned);
                });

                wait_for_outcome(rx).await
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn response_with_status(status: &str) -> AnalysisResponse {
        serde_json::from_str(&format!(
            r#"{{"data":{{"id":"a1","type":"analysis","attributes":{{"status":"{}"}}}}}}"#,
            status
        ))
        .unwrap()
    }

    fn dummy_report() -> RemoteScanReport {
        RemoteScanReport {
            positives: 0,
            total_engines: 70,
            detections: vec![],
            permalink: "https://example.test/f/d".to_string(),
            analysis_id: "a1".to_string(),
            sha256: "d".to_string(),
        }
    }

    #[test]
    fn test_poll_fraction_caps_below_completion() {
        let mut last = -1.0f32;
        for attempt in 1..=30 {
            let fraction = poll_fraction(attempt, 30);
            assert!(fraction >= last);
            assert!(fraction < 1.0);
            last = fraction;
        }
        assert_eq!(poll_fraction(5, 0), 0.0);
    }

    #[tokio::test]
    async fn test_polling_never_exceeds_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = drive_polling(
            Duration::ZERO,
            5,
            5,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(response_with_status("queued")) }
            },
            |_| {},
        )
        .await;

        match result {
            Err(ScanApiError::Timeout { attempts }) => assert_eq!(attempts, 5),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_transient_failures_do_not_consume_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = drive_polling(
            Duration::ZERO,
            3,
            5,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ScanApiError::NetworkError { message: "reset".to_string() })
                    } else {
                        Ok(response_with_status("queued"))
                    }
                }
            },
            |_| {},
        )
        .await;

        // Two failures plus the full three-attempt budget
        match result {
            Err(ScanApiError::Timeout { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_persistent_network_failure_hits_separate_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = drive_polling(
            Duration::ZERO,
            30,
            3,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ScanApiError::NetworkError { message: "down".to_string() }) }
            },
            |_| {},
        )
        .await;

        match result {
            Err(ScanApiError::NetworkError { .. }) => {}
            other => panic!("expected network error, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_authoritative_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = drive_polling(
            Duration::ZERO,
            30,
            5,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ScanApiError::InvalidApiKey) }
            },
            |_| {},
        )
        .await;

        match result {
            Err(ScanApiError::InvalidApiKey) => {}
            other => panic!("expected invalid key, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_polling_returns_completed_response() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut attempts_seen = Vec::new();

        let result = drive_polling(
            Duration::ZERO,
            30,
            5,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    let status = match n {
                        0 => "queued",
                        1 => "in-progress",
                        _ => "completed",
                    };
                    Ok(response_with_status(status))
                }
            },
            |attempt| attempts_seen.push(attempt),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(attempts_seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_concurrent_same_digest_runs_exactly_one_job() {
        let map = Arc::new(InflightMap::new());
        let uploads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let map = Arc::clone(&map);
            let uploads = Arc::clone(&uploads);
            handles.push(tokio::spawn(async move {
                match map.begin("digest-1") {
                    Role::Leader { tx, rx } => {
                        let map_for_job = Arc::clone(&map);
                        let uploads_for_job = Arc::clone(&uploads);
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            uploads_for_job.fetch_add(1, Ordering::SeqCst);
                            let _ = tx.send(Some(Ok(dummy_report())));
                            map_for_job.finish("digest-1");
                        });
                        wait_for_outcome(rx).await
                    }
                    Role::Follower(rx) => wait_for_outcome(rx).await,
                }
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(outcome.is_ok());
        }
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        assert_eq!(map.len(), 0);
    }

    #[tokio::test]
    async fn test_attaching_after_publish_sees_the_result() {
        let map = InflightMap::new();

        let tx = match map.begin("digest-2") {
            Role::Leader { tx, .. } => tx,
            Role::Follower(_) => panic!("first caller must lead"),
        };
        let _ = tx.send(Some(Ok(dummy_report())));

        match map.begin("digest-2") {
            Role::Follower(rx) => {
                let outcome = wait_for_outcome(rx).await;
                assert!(outcome.is_ok());
            }
            Role::Leader { .. } => panic!("in-flight digest must attach"),
        }
    }

    #[tokio::test]
    async fn test_vanished_job_surfaces_as_error() {
        let map = InflightMap::new();

        let rx = match map.begin("digest-3") {
            Role::Leader { tx, rx } => {
                drop(tx);
                rx
            }
            Role::Follower(_) => panic!("first caller must lead"),
        };

        match wait_for_outcome(rx).await {
            Err(ScanApiError::Other { .. }) => {}
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_orchestrator_fails_fast() {
        use crate::logic::config::CacheConfig;
        use crate::logic::storage::Database;

        let config = RemoteConfig {
            api_base: "https://example.test".to_string(),
            api_key: String::new(),
            permalink_base: "https://example.test/f".to_string(),
            poll_interval_secs: 1,
            max_poll_attempts: 1,
            max_poll_failures: 1,
            rate_limit_per_minute: 0,
            max_upload_size_mb: 32,
            timeout_seconds: 5,
            enabled: true,
        };
        let db = Arc::new(Database::open_in_memory().unwrap());
        let cache = Arc::new(VerdictCache::new(
            db,
            CacheConfig {
                clean_ttl_days: 3,
                threat_ttl_days: 30,
                trust_threshold: 80.0,
            },
        ));
        let orchestrator =
            ScanOrchestrator::new(Arc::new(AnalysisClient::new(config.clone())), cache, config);

        let progress = ProgressSender::disabled();
        let result = orchestrator
            .scan(Path::new("f.bin"), "d", "f.bin", 10, &progress)
            .await;
        match result {
            Err(ScanApiError::NotConfigured) => {}
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }
}
