//! # Application State Management
//!
//! Shared state accessed by every HTTP request handler: configuration,
//! request metrics, the scratch directory, the shared HTTP connection
//! pool, and the shutdown signal that cancels in-flight polling waits.
//!
//! Mutable pieces use the `Arc<RwLock<T>>` pattern: many handlers read
//! simultaneously, one writer at a time. Readers clone snapshots so no
//! lock is held across an await point.

use crate::audio::scratch::ScratchDir;
use crate::audio::transcode::{FfmpegTranscoder, Transcoder};
use crate::audio::TargetFormat;
use crate::config::{AppConfig, Credentials};
use crate::dialog::DialogClient;
use crate::transcription::{PollPolicy, TranscriptionClient};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::watch;

/// The main application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (updated by middleware on every request)
    metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    start_time: Instant,

    /// Shared outbound HTTP connection pool
    http: reqwest::Client,

    /// Collaborator credentials, read once from the environment
    credentials: Credentials,

    /// Scratch directory for per-request audio files
    scratch: ScratchDir,

    /// Audio transcoder used by the normalizer
    transcoder: Arc<dyn Transcoder>,

    /// Broadcasts `true` once, when the server begins shutting down
    shutdown: Arc<watch::Sender<bool>>,
}

/// Request metrics collected across all HTTP requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Requests currently being processed
    pub in_flight_requests: u32,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Request statistics for a single endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the shared state, creating the scratch directory if needed.
    pub fn new(config: AppConfig, credentials: Credentials) -> Result<Self> {
        let scratch = ScratchDir::create(&config.storage.scratch_dir)?;
        let transcoder = Arc::new(FfmpegTranscoder::new(config.audio.ffmpeg_path.clone()));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            http: reqwest::Client::new(),
            credentials,
            scratch,
            transcoder,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Get a copy of the current configuration. Cloning releases the read
    /// lock immediately.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Dialog client built from the current configuration, sharing the
    /// process-wide connection pool. Built per request so runtime config
    /// updates take effect immediately.
    pub fn dialog_client(&self) -> DialogClient {
        let config = self.get_config();
        DialogClient::new(
            self.http.clone(),
            &config.dialog,
            self.credentials.dialog_api_key.clone(),
        )
    }

    /// Transcription client built from the current configuration.
    pub fn transcription_client(&self) -> TranscriptionClient {
        let config = self.get_config();
        TranscriptionClient::new(
            self.http.clone(),
            &config.transcription,
            self.credentials.transcription_api_key.clone(),
        )
    }

    /// Poll bounds for transcription jobs, from the current configuration.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_config(&self.get_config().transcription)
    }

    /// The audio format required by the dialog service.
    pub fn target_format(&self) -> TargetFormat {
        TargetFormat::from_config(&self.get_config().audio)
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn transcoder(&self) -> &dyn Transcoder {
        self.transcoder.as_ref()
    }

    /// Subscribe to the shutdown signal; used to cancel in-flight waits.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Flip the shutdown signal. Idempotent.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn increment_in_flight(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.in_flight_requests += 1;
    }

    pub fn decrement_in_flight(&self) {
        let mut metrics = self.metrics.write().unwrap();
        // Guard against underflow if a response never passed through the
        // metrics middleware on the way in.
        if metrics.in_flight_requests > 0 {
            metrics.in_flight_requests -= 1;
        }
    }

    /// Consistent copy of the metrics for serialization; the lock is not
    /// held while the HTTP response is built.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            in_flight_requests: metrics.in_flight_requests,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average = total duration ÷ request count, zero when idle.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests to this endpoint that failed (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.scratch_dir = dir.path().join("uploads").to_string_lossy().into_owned();
        config.dialog.endpoint = "https://dialog.example.test".to_string();
        config.dialog.bot_id = "BOT123".to_string();
        config.dialog.bot_alias_id = "ALIAS456".to_string();
        let credentials = Credentials {
            dialog_api_key: Some("dialog-key".to_string()),
            transcription_api_key: None,
        };
        let state = AppState::new(config, credentials).unwrap();
        (dir, state)
    }

    #[test]
    fn test_new_creates_scratch_dir() {
        let (dir, state) = test_state();
        assert!(dir.path().join("uploads").is_dir());
        assert_eq!(state.target_format(), TargetFormat::new(16000, 1));
    }

    #[test]
    fn test_endpoint_metrics_accumulate() {
        let (_dir, state) = test_state();

        state.record_endpoint_request("POST /api/v1/converse/audio", 120, false);
        state.record_endpoint_request("POST /api/v1/converse/audio", 80, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /api/v1/converse/audio"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.error_count, 1);
        assert!((metric.average_duration_ms() - 100.0).abs() < f64::EPSILON);
        assert!((metric.error_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_in_flight_never_underflows() {
        let (_dir, state) = test_state();
        state.decrement_in_flight();
        assert_eq!(state.get_metrics_snapshot().in_flight_requests, 0);

        state.increment_in_flight();
        state.increment_in_flight();
        state.decrement_in_flight();
        assert_eq!(state.get_metrics_snapshot().in_flight_requests, 1);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let (_dir, state) = test_state();
        let mut bad = state.get_config();
        bad.server.port = 0;
        assert!(state.update_config(bad).is_err());
        assert_eq!(state.get_config().server.port, 8080);
    }

    #[tokio::test]
    async fn test_shutdown_signal_reaches_subscribers() {
        let (_dir, state) = test_state();
        let mut rx = state.shutdown_signal();
        assert!(!*rx.borrow());

        state.trigger_shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
