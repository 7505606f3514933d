//! Remote Analysis API Client
//!
//! Thin async client for the VirusTotal-v3-shaped service: multipart file
//! upload and analysis polling, authenticated with the `x-apikey` header.
//!
//! Features:
//! - Free-tier request pacing: the client defers when its own budget for
//!   the current minute is spent, and only a service-side 429 surfaces as
//!   a rate-limit error
//! - Upload size cap enforced before any bytes are sent
//! - Status codes mapped to the typed error taxonomy

use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::types::{AnalysisResponse, ScanApiError, UploadResponse};
use crate::logic::config::RemoteConfig;

// ============================================================================
// RATE WINDOW
// ============================================================================

/// Fixed one-minute request window. A limit of zero disables pacing.
pub(crate) struct RateWindow {
    limit: u32,
    requests_this_minute: u32,
    minute_start: Instant,
}

impl RateWindow {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            limit,
            requests_this_minute: 0,
            minute_start: Instant::now(),
        }
    }

    /// Record a request, or return the seconds to wait when the budget
    /// for this minute is already spent.
    pub(crate) fn try_acquire(&mut self) -> Option<u64> {
        if self.limit == 0 {
            return None;
        }

        let now = Instant::now();
        if now.duration_since(self.minute_start) >= Duration::from_secs(60) {
            self.minute_start = now;
            self.requests_this_minute = 0;
        }

        if self.requests_this_minute >= self.limit {
            let elapsed = now.duration_since(self.minute_start).as_secs();
            return Some((60 - elapsed).max(1));
        }

        self.requests_this_minute += 1;
        None
    }

    pub(crate) fn requests_this_minute(&self) -> u32 {
        self.requests_this_minute
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct AnalysisClient {
    http_client: reqwest::Client,
    config: RemoteConfig,
    rate: Mutex<RateWindow>,
}

impl AnalysisClient {
    pub fn new(config: RemoteConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            rate: Mutex::new(RateWindow::new(config.rate_limit_per_minute)),
            config,
        }
    }

    /// Whether an API key is present and remote scanning is on
    pub fn is_configured(&self) -> bool {
        self.config.enabled && !self.config.api_key.is_empty()
    }

    pub fn requests_this_minute(&self) -> u32 {
        self.rate.lock().requests_this_minute()
    }

    /// Sleep until the local request budget has room
    async fn wait_for_slot(&self) {
        loop {
            let wait = self.rate.lock().try_acquire();
            match wait {
                None => return,
                Some(secs) => {
                    log::debug!("Request budget spent, deferring {}s", secs);
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                }
            }
        }
    }

    /// Reject files over the service's upload limit before reading them
    pub fn check_upload_size(&self, path: &Path, size: u64) -> Result<(), ScanApiError> {
        let limit = self.config.max_upload_size_bytes();
        if size > limit {
            log::warn!(
                "Refusing upload of {} ({} bytes > {} byte limit)",
                path.display(),
                size,
                limit
            );
            return Err(ScanApiError::FileTooLarge { size, limit });
        }
        Ok(())
    }

    /// Upload file bytes for analysis, returning the opaque analysis id
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ScanApiError> {
        if !self.is_configured() {
            return Err(ScanApiError::NotConfigured);
        }

        let size = bytes.len() as u64;
        let limit = self.config.max_upload_size_bytes();
        if size > limit {
            return Err(ScanApiError::FileTooLarge { size, limit });
        }

        self.wait_for_slot().await;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let url = format!("{}/files", self.config.api_base);

        let response = self
            .http_client
            .post(&url)
            .header("x-apikey", &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScanApiError::NetworkError { message: e.to_string() })?;

        match response.status().as_u16() {
            200..=299 => {
                let parsed: UploadResponse = response
                    .json()
                    .await
                    .map_err(|e| ScanApiError::ParseError { message: e.to_string() })?;
                Ok(parsed.data.id)
            }
            401 => Err(ScanApiError::InvalidApiKey),
            429 => Err(ScanApiError::RateLimited { retry_after: 60 }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ScanApiError::Other {
                    message: format!("Upload failed with status {}: {}", status, body),
                })
            }
        }
    }

    /// Query the status of an analysis by id
    pub async fn fetch_analysis(&self, analysis_id: &str) -> Result<AnalysisResponse, ScanApiError> {
        if !self.is_configured() {
            return Err(ScanApiError::NotConfigured);
        }

        self.wait_for_slot().await;

        let url = format!("{}/analyses/{}", self.config.api_base, analysis_id);

        let response = self
            .http_client
            .get(&url)
            .header("x-apikey", &self.config.api_key)
            .send()
            .await
            .map_err(|e| ScanApiError::NetworkError { message: e.to_string() })?;

        match response.status().as_u16() {
            200..=299 => response
                .json()
                .await
                .map_err(|e| ScanApiError::ParseError { message: e.to_string() }),
            401 => Err(ScanApiError::InvalidApiKey),
            404 => Err(ScanApiError::NotFound),
            429 => Err(ScanApiError::RateLimited { retry_after: 60 }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ScanApiError::Other {
                    message: format!("Status query failed with status {}: {}", status, body),
                })
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

    fn test_config(api_key: &str) -> RemoteConfig {
        RemoteConfig {
            api_base: "https://example.test/api/v3".to_string(),
            api_key: api_key.to_string(),
            permalink_base: "https://example.test/gui/file".to_string(),
            poll_interval_secs: 10,
            max_poll_attempts: 30,
            max_poll_failures: 5,
            rate_limit_per_minute: 4,
            max_upload_size_mb: 32,
            timeout_seconds: 120,
            enabled: true,
        }
    }

    #[test]
    fn test_rate_window_allows_budget_then_defers() {
        let mut window = RateWindow::new(4);
        for _ in 0..4 {
            assert_eq!(window.try_acquire(), None);
        }
        let wait = window.try_acquire();
        assert!(wait.is_some());
        assert!(wait.unwrap() >= 1);
        assert_eq!(window.requests_this_minute(), 4);
    }

    #[test]
    fn test_rate_window_zero_limit_never_defers() {
        let mut window = RateWindow::new(0);
        for _ in 0..100 {
            assert_eq!(window.try_acquire(), None);
        }
    }

    #[test]
    fn test_is_configured_requires_key_and_enabled() {
        assert!(AnalysisClient::new(test_config("secret")).is_configured());
        assert!(!AnalysisClient::new(test_config("")).is_configured());

        let disabled = RemoteConfig {
            enabled: false,
            ..test_config("secret")
        };
        assert!(!AnalysisClient::new(disabled).is_configured());
    }

    #[test]
    fn test_upload_size_check() {
        let client = AnalysisClient::new(test_config("secret"));
        let limit = 32 * 1024 * 1024;
        let path = Path::new("huge.bin");

        assert!(client.check_upload_size(path, limit).is_ok());
        match client.check_upload_size(path, limit + 1) {
            Err(ScanApiError::FileTooLarge { size, limit: l }) => {
                assert_eq!(size, limit + 1);
                assert_eq!(l, limit);
            }
            other => panic!("expected FileTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = AnalysisClient::new(test_config(""));
        match client.upload("a.bin", vec![1, 2, 3]).await {
            Err(ScanApiError::NotConfigured) => {}
            other => panic!("expected NotConfigured, got {:?}", other),
        }
        match client.fetch_analysis("id").await {
            Err(ScanApiError::NotConfigured) => {}
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }
}
