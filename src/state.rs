//! # Application State
//!
//! Everything the HTTP handlers and WebSocket actors share. `AppState` is cheap
//! to clone: every field is either immutable or behind an `Arc`.
//!
//! ## Contents:
//! - **config**: Loaded once at startup, read-only afterwards
//! - **orchestrator**: The voice pipeline, which owns the session store
//! - **metrics**: Request/error counters fed by the metrics middleware
//! - **open_streams**: Number of live `/ws/audio` connections

use crate::config::AppConfig;
use crate::conversation::{ConversationOrchestrator, SessionStore};
use crate::error::AppResult;
use crate::generation::{GeminiModel, LanguageModel, ResponseGenerator};
use crate::speech::SpeechEncoder;
use crate::transcription::{AssemblyAiTranscriber, SpeechToText};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
    open_streams: Arc<AtomicUsize>,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Key: `"<METHOD> <path>"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build state around the real transcription and language-model clients.
    ///
    /// Missing credentials do not fail here; the clients report a configuration
    /// error per call and `/health` reports the service as degraded.
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let transcriber = AssemblyAiTranscriber::new(&config.services, &config.transcription)?;
        let model = GeminiModel::new(&config.services, &config.generation)?;
        Ok(Self::with_services(config, Arc::new(transcriber), Arc::new(model)))
    }

    /// Build state around arbitrary service implementations.
    pub fn with_services(
        config: AppConfig,
        transcriber: Arc<dyn SpeechToText>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let store = Arc::new(SessionStore::new(config.conversation.max_messages));
        let orchestrator = ConversationOrchestrator::new(
            store,
            transcriber,
            ResponseGenerator::new(model),
            SpeechEncoder::new(),
            config.upload.max_audio_bytes,
        );

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.orchestrator.store()
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().error_count += 1;
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn stream_opened(&self) {
        self.open_streams.fetch_add(1, Ordering::SeqCst);
    }

    /// Saturates at zero.
    pub fn stream_closed(&self) {
        let _ = self
            .open_streams
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppMetrics {
    pub fn error_rate(&self) -> f64 {
        ratio(self.error_count, self.request_count)
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        ratio(self.total_duration_ms, self.request_count)
    }

    pub fn error_rate(&self) -> f64 {
        ratio(self.error_count, self.request_count)
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}
