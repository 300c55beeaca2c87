//! # Conversation Orchestrator
//!
//! Runs one voice turn for a session:
//!
//! `Received → Transcribing → Contextualizing → Generating → Encoding → Responded`
//!
//! Only the `Received` checks (session id, audio present, size limit) can fail
//! the request. After that every stage that fails is replaced with a fixed
//! substitute and the pipeline keeps going, so the caller always gets a reply.
//! History writes never fail the turn either.

use crate::audio::UploadedAudio;
use crate::conversation::store::{validate_session_id, Role, SessionStore};
use crate::error::{AppError, AppResult};
use crate::generation::ResponseGenerator;
use crate::speech::{SpeechEncoder, SpeechPayload};
use crate::transcription::SpeechToText;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transcript used when speech-to-text fails.
pub const FALLBACK_TRANSCRIPT: &str =
    "Sorry, I couldn't make out the audio. Could you please try again?";

/// Reply used when response generation fails outright.
pub const FALLBACK_REPLY: &str =
    "I'm having trouble connecting right now. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Transcribing,
    Contextualizing,
    Generating,
    Encoding,
    Responded,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Transcribing => "transcribing",
            PipelineStage::Contextualizing => "contextualizing",
            PipelineStage::Generating => "generating",
            PipelineStage::Encoding => "encoding",
            PipelineStage::Responded => "responded",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub transcript: String,
    pub reply: String,
    pub payload: SpeechPayload,
    /// Stages whose result was substituted
    pub fallbacks: Vec<PipelineStage>,
}

impl TurnOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

/// Sequences transcription, history, generation, and encoding for a request.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    store: Arc<SessionStore>,
    transcriber: Arc<dyn SpeechToText>,
    generator: ResponseGenerator,
    encoder: SpeechEncoder,
    max_audio_bytes: usize,
}

impl fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationOrchestrator")
            .field("store", &self.store)
            .field("max_audio_bytes", &self.max_audio_bytes)
            .finish_non_exhaustive()
    }
}

impl ConversationOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        transcriber: Arc<dyn SpeechToText>,
        generator: ResponseGenerator,
        encoder: SpeechEncoder,
        max_audio_bytes: usize,
    ) -> Self {
        Self {
            store,
            transcriber,
            generator,
            encoder,
            max_audio_bytes,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run one voice turn. `audio` is consumed and its temporary file removed
    /// before this returns, whatever the outcome.
    pub async fn handle_audio(&self, session_id: &str, audio: UploadedAudio) -> AppResult<TurnOutcome> {
        let start_time = Instant::now();
        let mut fallbacks = Vec::new();

        // Received
        self.stage(session_id, PipelineStage::Received);
        self.validate_request(session_id, &audio)?;
        let audio_bytes = audio.read().await?;
        drop(audio);

        // Transcribing
        self.stage(session_id, PipelineStage::Transcribing);
        let transcript = match self.transcriber.transcribe(audio_bytes).await {
            Ok(text) => text,
            Err(err) => {
                self.substituted(session_id, PipelineStage::Transcribing, &err);
                fallbacks.push(PipelineStage::Transcribing);
                FALLBACK_TRANSCRIPT.to_string()
            }
        };
        self.record(session_id, Role::User, &transcript);

        // Contextualizing
        self.stage(session_id, PipelineStage::Contextualizing);
        let history = self.store.get(session_id).unwrap_or_else(|err| {
            warn!(session_id = %session_id, error = %err, "Could not read history, continuing without context");
            Vec::new()
        });

        // Generating
        self.stage(session_id, PipelineStage::Generating);
        let reply = match self.generator.generate(&transcript, &history).await {
            Ok(reply) => reply,
            Err(err) => {
                self.substituted(session_id, PipelineStage::Generating, &err);
                fallbacks.push(PipelineStage::Generating);
                FALLBACK_REPLY.to_string()
            }
        };
        drop(history);
        self.record(session_id, Role::Assistant, &reply);

        // Encoding
        self.stage(session_id, PipelineStage::Encoding);
        let payload = match self.encoder.encode(&reply) {
            Ok(payload) => payload,
            Err(err) => {
                self.substituted(session_id, PipelineStage::Encoding, &err);
                fallbacks.push(PipelineStage::Encoding);
                self.encoder.fallback(&reply)
            }
        };

        self.stage(session_id, PipelineStage::Responded);
        info!(
            session_id = %session_id,
            transcript_chars = transcript.len(),
            reply_chars = reply.len(),
            payload_bytes = payload.len(),
            fallbacks = fallbacks.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Voice turn completed"
        );

        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            transcript,
            reply,
            payload,
            fallbacks,
        })
    }

    fn validate_request(&self, session_id: &str, audio: &UploadedAudio) -> AppResult<()> {
        validate_session_id(session_id)?;
        if audio.is_empty() {
            return Err(AppError::Validation("Audio file is empty".to_string()));
        }
        if audio.len() > self.max_audio_bytes {
            return Err(AppError::Validation(format!(
                "Audio file too large: {} bytes (max: {} bytes)",
                audio.len(),
                self.max_audio_bytes
            )));
        }
        Ok(())
    }

    /// History bookkeeping must never break the user-facing reply.
    fn record(&self, session_id: &str, role: Role, content: &str) {
        if let Err(err) = self.store.append(session_id, role, content) {
            warn!(
                session_id = %session_id,
                role = %role,
                error = %err,
                "Failed to append message to history"
            );
        }
    }

    fn stage(&self, session_id: &str, stage: PipelineStage) {
        debug!(session_id = %session_id, stage = %stage, "Pipeline stage");
    }

    fn substituted(&self, session_id: &str, stage: PipelineStage, err: &AppError) {
        warn!(
            session_id = %session_id,
            stage = %stage,
            error_type = err.kind().as_str(),
            error = %err,
            "Stage failed, substituting fallback"
        );
    }
}
