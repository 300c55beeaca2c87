//! # Configuration Management
//!
//! Loads relay configuration from, in priority order (highest first):
//! 1. Well-known environment variables (`HOST`, `PORT`, `ASSEMBLYAI_API_KEY`, `GEMINI_API_KEY`)
//! 2. Environment variables with the `APP__` prefix (`APP__SERVER__PORT=3000`)
//! 3. An optional `config.toml` in the working directory
//! 4. Built-in defaults
//!
//! Missing service credentials never stop the server from starting. They are
//! reported by [`AppConfig::missing_credentials`] and downgrade `/health`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub conversation: ConversationConfig,
    pub transcription: TranscriptionConfig,
    pub generation: GenerationConfig,
    pub upload: UploadConfig,
    pub streaming: StreamingConfig,
}

/// Server bind settings.
///
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream service endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Credential for the transcription service
    pub transcription_api_key: Option<String>,
    pub transcription_base_url: String,
    /// Credential for the language-model service
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Per-session history cap; the oldest messages are evicted first
    pub max_messages: usize,
}

/// Polling behaviour for the transcription job.
///
/// The defaults give a ceiling of roughly 30 seconds per transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    /// Timeout for each individual HTTP call (upload, submit, poll)
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_audio_bytes: usize,
    /// Where uploaded audio lives until the request that owns it completes
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub recordings_dir: PathBuf,
    /// Recordings smaller than this are discarded on close
    pub min_recording_bytes: u64,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            services: ServicesConfig {
                transcription_api_key: None,
                transcription_base_url: "https://api.assemblyai.com".to_string(),
                llm_api_key: None,
                llm_base_url: "https://generativelanguage.googleapis.com".to_string(),
                llm_model: "gemini-1.5-flash".to_string(),
            },
            conversation: ConversationConfig { max_messages: 20 },
            transcription: TranscriptionConfig {
                poll_interval_ms: 1000,
                max_poll_attempts: 30,
                request_timeout_ms: 30_000,
            },
            generation: GenerationConfig { timeout_ms: 10_000 },
            upload: UploadConfig {
                max_audio_bytes: 10 * 1024 * 1024,
                upload_dir: PathBuf::from("uploads"),
            },
            streaming: StreamingConfig {
                recordings_dir: PathBuf::from("recordings"),
                min_recording_bytes: 1024,
                heartbeat_interval_secs: 30,
                client_timeout_secs: 60,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml`, and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP__SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP__TRANSCRIPTION__MAX_POLL_ATTEMPTS=10`: Shorten the polling ceiling
    /// - `PORT=8080`: Special case for deployment platforms
    /// - `ASSEMBLYAI_API_KEY=...`: Transcription credential
    /// - `GEMINI_API_KEY=...`: Language-model credential
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Some(key) = non_empty_env("ASSEMBLYAI_API_KEY") {
            settings = settings.set_override("services.transcription_api_key", key)?;
        }

        if let Some(key) = non_empty_env("GEMINI_API_KEY") {
            settings = settings.set_override("services.llm_api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with.
    ///
    /// Credentials are deliberately not checked here; see [`Self::missing_credentials`].
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.conversation.max_messages == 0 {
            return Err(anyhow::anyhow!("Conversation history cap must be greater than 0"));
        }

        if self.transcription.max_poll_attempts == 0 {
            return Err(anyhow::anyhow!("Transcription poll attempts must be greater than 0"));
        }

        if self.transcription.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Transcription poll interval must be greater than 0"));
        }

        if self.upload.max_audio_bytes == 0 {
            return Err(anyhow::anyhow!("Upload size limit must be greater than 0"));
        }

        Ok(())
    }

    /// Names of the required credentials that are not configured.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.services.transcription_api_key) {
            missing.push("ASSEMBLYAI_API_KEY");
        }
        if is_blank(&self.services.llm_api_key) {
            missing.push("GEMINI_API_KEY");
        }
        missing
    }
}

impl TranscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.conversation.max_messages, 20);
        assert_eq!(config.transcription.max_poll_attempts, 30);
        assert_eq!(config.transcription.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.generation.timeout(), Duration::from_secs(10));
        assert_eq!(config.upload.max_audio_bytes, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transcription.max_poll_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.conversation.max_messages = 0;
        assert!(config.validate().is_err());
    }

    /// Missing keys are a health concern, not a startup failure.
    #[test]
    fn test_missing_credentials() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.missing_credentials(),
            vec!["ASSEMBLYAI_API_KEY", "GEMINI_API_KEY"]
        );

        config.services.transcription_api_key = Some("key".to_string());
        config.services.llm_api_key = Some("   ".to_string());
        assert_eq!(config.missing_credentials(), vec!["GEMINI_API_KEY"]);

        config.services.llm_api_key = Some("key".to_string());
        assert!(config.missing_credentials().is_empty());
    }
}
