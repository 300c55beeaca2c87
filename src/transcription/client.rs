//! # AssemblyAI Transcription Client
//!
//! ## Request Flow:
//! 1. **Upload**: `POST /v2/upload` with the raw bytes, returns an `upload_url`
//! 2. **Submit**: `POST /v2/transcript` with that URL, returns a job `id`
//! 3. **Poll**: `GET /v2/transcript/{id}` once per interval until the job reports
//!    `completed` or `error`, giving up after the configured number of attempts
//!
//! ## Failure Classification:
//! - Transport timeout → `Timeout`
//! - HTTP 401 → `Auth`, HTTP 429 → `RateLimit`
//! - HTTP >= 500 → `Api` (502)
//! - Missing `upload_url`/`id`, job `error` status, anything else → `Api`
//! - Poll budget exhausted → `Timeout`

use crate::config::{ServicesConfig, TranscriptionConfig};
use crate::error::{AppError, AppResult};
use crate::transcription::SpeechToText;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

const SERVICE: &str = "Transcription service";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: Option<String>,
    status: Option<String>,
    text: Option<String>,
    error: Option<String>,
}

/// HTTP client for an AssemblyAI-compatible transcription API.
#[derive(Debug, Clone)]
pub struct AssemblyAiTranscriber {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl AssemblyAiTranscriber {
    pub fn new(services: &ServicesConfig, settings: &TranscriptionConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: services.transcription_base_url.trim_end_matches('/').to_string(),
            api_key: services
                .transcription_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            poll_interval: settings.poll_interval(),
            max_poll_attempts: settings.max_poll_attempts,
        })
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AppError::Config("Transcription API key is not configured".to_string())
        })
    }

    async fn upload(&self, api_key: &str, audio: Bytes) -> AppResult<String> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", api_key)
            .header("content-type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, &e))?;

        let body: UploadResponse = read_json(response).await?;
        body.upload_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::api("Transcription upload returned no upload URL"))
    }

    async fn submit(&self, api_key: &str, audio_url: &str) -> AppResult<String> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", api_key)
            .json(&TranscriptRequest { audio_url })
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, &e))?;

        let body: TranscriptResponse = read_json(response).await?;
        body.id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::api("Transcription request returned no job ID"))
    }

    async fn poll(&self, api_key: &str, job_id: &str) -> AppResult<String> {
        let url = format!("{}/v2/transcript/{}", self.base_url, job_id);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for attempt in 1..=self.max_poll_attempts {
            ticker.tick().await;

            let response = self
                .client
                .get(&url)
                .header("authorization", api_key)
                .send()
                .await
                .map_err(|e| AppError::from_transport(SERVICE, &e))?;
            let job: TranscriptResponse = read_json(response).await?;

            match job.status.as_deref() {
                Some("completed") => {
                    let text = job.text.unwrap_or_default().trim().to_string();
                    if text.is_empty() {
                        return Err(AppError::api("Transcription completed with an empty transcript"));
                    }
                    debug!(job_id = %job_id, attempt, "Transcription job completed");
                    return Ok(text);
                }
                Some("error") => {
                    let reason = job.error.unwrap_or_else(|| "unknown error".to_string());
                    return Err(AppError::api(format!("Transcription failed: {reason}")));
                }
                status => {
                    debug!(job_id = %job_id, attempt, status = ?status, "Transcription still pending");
                }
            }
        }

        warn!(job_id = %job_id, attempts = self.max_poll_attempts, "Transcription polling gave up");
        Err(AppError::Timeout(format!(
            "Transcription did not complete after {} attempts",
            self.max_poll_attempts
        )))
    }
}

#[async_trait]
impl SpeechToText for AssemblyAiTranscriber {
    #[instrument(skip(self, audio), fields(audio_bytes = audio.len()))]
    async fn transcribe(&self, audio: Bytes) -> AppResult<String> {
        if audio.is_empty() {
            return Err(AppError::Validation("Audio data is empty".to_string()));
        }
        let api_key = self.api_key()?;
        let start_time = Instant::now();

        let upload_url = self.upload(api_key, audio).await?;
        let job_id = self.submit(api_key, &upload_url).await?;
        let text = self.poll(api_key, &job_id).await?;

        info!(
            job_id = %job_id,
            chars = text.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Transcription completed"
        );
        Ok(text)
    }
}

/// Decode a JSON body, classifying non-success statuses first.
async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::from_upstream_status(SERVICE, status.as_u16(), &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AppError::api(format!("Invalid response from {SERVICE}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcriber_for(server: &MockServer, api_key: Option<&str>, attempts: u32) -> AssemblyAiTranscriber {
        let mut config = AppConfig::default();
        config.services.transcription_base_url = server.uri();
        config.services.transcription_api_key = api_key.map(str::to_string);
        config.transcription.poll_interval_ms = 1;
        config.transcription.max_poll_attempts = attempts;
        AssemblyAiTranscriber::new(&config.services, &config.transcription).unwrap()
    }

    async fn mount_upload_and_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .and(header("authorization", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "upload_url": "https://cdn.example/audio-1" })),
            )
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .and(body_json(json!({ "audio_url": "https://cdn.example/audio-1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "job-1", "status": "queued" })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_transcribe_success() {
        let server = MockServer::start().await;
        mount_upload_and_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v2/transcript/job-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "job-1", "status": "completed", "text": " Hello there. " })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = transcriber_for(&server, Some("test-key"), 30);
        let text = transcriber.transcribe(Bytes::from_static(b"RIFF....")).await.unwrap();
        assert_eq!(text, "Hello there.");
    }

    #[tokio::test]
    async fn test_poll_budget_exhausted_is_timeout() {
        let server = MockServer::start().await;
        mount_upload_and_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v2/transcript/job-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "job-1", "status": "processing" })),
            )
            .expect(30)
            .mount(&server)
            .await;

        let transcriber = transcriber_for(&server, Some("test-key"), 30);
        let err = transcriber.transcribe(Bytes::from_static(b"audio")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_job_error_status() {
        let server = MockServer::start().await;
        mount_upload_and_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v2/transcript/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "id": "job-1", "status": "error", "error": "unsupported codec" }),
            ))
            .mount(&server)
            .await;

        let transcriber = transcriber_for(&server, Some("test-key"), 30);
        let err = transcriber.transcribe(Bytes::from_static(b"audio")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert!(err.to_string().contains("unsupported codec"));
    }

    #[tokio::test]
    async fn test_missing_upload_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let transcriber = transcriber_for(&server, Some("test-key"), 30);
        let err = transcriber.transcribe(Bytes::from_static(b"audio")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
    }

    #[tokio::test]
    async fn test_missing_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "upload_url": "https://cdn.example/audio-1" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "queued" })))
            .mount(&server)
            .await;

        let transcriber = transcriber_for(&server, Some("test-key"), 30);
        let err = transcriber.transcribe(Bytes::from_static(b"audio")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert!(err.to_string().contains("job ID"));
    }

    #[tokio::test]
    async fn test_status_classification() {
        for (status, expected) in [
            (401, ErrorKind::Auth),
            (429, ErrorKind::RateLimit),
            (503, ErrorKind::Api),
            (400, ErrorKind::Api),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v2/upload"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let transcriber = transcriber_for(&server, Some("test-key"), 30);
            let err = transcriber.transcribe(Bytes::from_static(b"audio")).await.unwrap_err();
            assert_eq!(err.kind(), expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn test_preconditions() {
        let server = MockServer::start().await;

        let transcriber = transcriber_for(&server, Some("test-key"), 30);
        let err = transcriber.transcribe(Bytes::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let transcriber = transcriber_for(&server, None, 30);
        let err = transcriber.transcribe(Bytes::from_static(b"audio")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
