//! # Response Generation
//!
//! Produces the assistant's reply for one user utterance.
//!
//! ## Flow:
//! 1. Validate the transcript
//! 2. Render the session history into a `role: content` context block
//! 3. Ask the language model for a short, conversational reply
//! 4. If the model call fails upstream (timeout, auth, throttling, bad
//!    response), answer from the keyword table instead
//!
//! Validation and configuration errors are returned to the caller unchanged.

pub mod client;
pub mod fallback;

use crate::conversation::store::Message;
use crate::error::{AppError, AppResult, ErrorKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub use client::GeminiModel;
pub use fallback::KeywordResponder;

/// Text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> AppResult<String>;
}

const INSTRUCTIONS: &str = "You are a friendly voice assistant having a spoken conversation. \
Reply in one or two short sentences, in a natural conversational tone. \
Do not use markdown, lists, or emojis because your reply will be read aloud.";

/// Language model plus keyword fallback.
#[derive(Clone)]
pub struct ResponseGenerator {
    model: Arc<dyn LanguageModel>,
    fallback: KeywordResponder,
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator").finish_non_exhaustive()
    }
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            fallback: KeywordResponder::new(),
        }
    }

    /// Generate a reply to `transcript` given the conversation so far.
    pub async fn generate(&self, transcript: &str, history: &[Message]) -> AppResult<String> {
        if transcript.trim().is_empty() {
            return Err(AppError::Validation("Transcript cannot be empty".to_string()));
        }

        let prompt = build_prompt(transcript, history);
        match self.model.complete(&prompt).await {
            Ok(reply) => Ok(reply),
            Err(err) if matches!(err.kind(), ErrorKind::Validation | ErrorKind::Config) => Err(err),
            Err(err) => {
                warn!(
                    error_type = err.kind().as_str(),
                    error = %err,
                    "Language model failed, using keyword fallback"
                );
                Ok(self.fallback.respond(transcript))
            }
        }
    }
}

/// Render history oldest-first as `role: content` lines.
pub fn render_context(history: &[Message]) -> String {
    history
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(transcript: &str, history: &[Message]) -> String {
    let context = render_context(history);
    let context = if context.is_empty() {
        "(no earlier messages)".to_string()
    } else {
        context
    };

    format!(
        "{INSTRUCTIONS}\n\nConversation so far:\n{context}\n\nThe user just said: \"{}\"\n\nRespond naturally:",
        transcript.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::store::Role;
    use chrono::Utc;
    use parking_lot::Mutex;

    struct ScriptedModel {
        result: fn() -> AppResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(result: fn() -> AppResult<String>) -> Arc<Self> {
            Arc::new(Self {
                result,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> AppResult<String> {
            self.prompts.lock().push(prompt.to_string());
            (self.result)()
        }
    }

    fn message(role: Role, content: &str) -> Message {
        Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_render_context_order() {
        let history = vec![
            message(Role::User, "first"),
            message(Role::Assistant, "second"),
            message(Role::User, "third"),
        ];
        assert_eq!(
            render_context(&history),
            "user: first\nassistant: second\nuser: third"
        );
    }

    #[tokio::test]
    async fn test_prompt_includes_history_and_transcript() {
        let model = ScriptedModel::new(|| Ok("Sounds good.".to_string()));
        let generator = ResponseGenerator::new(model.clone());
        let history = vec![message(Role::User, "I have a cat")];

        let reply = generator.generate("What should I name it?", &history).await.unwrap();
        assert_eq!(reply, "Sounds good.");

        let prompts = model.prompts.lock();
        assert!(prompts[0].contains("user: I have a cat"));
        assert!(prompts[0].contains("What should I name it?"));
        assert!(prompts[0].contains("one or two short sentences"));
    }

    #[tokio::test]
    async fn test_upstream_failure_uses_keywords() {
        let model = ScriptedModel::new(|| Err(AppError::bad_gateway("model down")));
        let generator = ResponseGenerator::new(model);
        let history = vec![message(Role::User, "anything at all")];

        let reply = generator.generate("thank you", &history).await.unwrap();
        assert_eq!(reply, "You're welcome! Is there anything else I can help you with?");

        let reply = generator.generate("thank you", &[]).await.unwrap();
        assert_eq!(reply, "You're welcome! Is there anything else I can help you with?");
    }

    #[tokio::test]
    async fn test_timeout_and_throttle_use_keywords() {
        let generator = ResponseGenerator::new(ScriptedModel::new(|| {
            Err(AppError::Timeout("slow".into()))
        }));
        assert!(generator.generate("tell me a joke", &[]).await.unwrap().contains("atoms"));

        let generator = ResponseGenerator::new(ScriptedModel::new(|| {
            Err(AppError::RateLimit("busy".into()))
        }));
        assert!(generator.generate("bye now", &[]).await.unwrap().starts_with("Goodbye"));
    }

    #[tokio::test]
    async fn test_config_error_propagates() {
        let generator = ResponseGenerator::new(ScriptedModel::new(|| {
            Err(AppError::Config("no key".into()))
        }));
        let err = generator.generate("hello", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected() {
        let model = ScriptedModel::new(|| Ok("unused".to_string()));
        let generator = ResponseGenerator::new(model.clone());
        let err = generator.generate("   ", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(model.prompts.lock().is_empty());
    }
}
