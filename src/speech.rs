//! # Speech Encoding
//!
//! Turns reply text into the outbound payload. No synthesis happens yet: the
//! payload is the reply text as UTF-8 behind a short marker prefix.
//!
//! Callers pick response headers with [`SpeechPayload::content_type`], which
//! treats anything under [`AUDIO_THRESHOLD_BYTES`] as a plain-text fallback.
//! That threshold is a length heuristic, not a property of the bytes.

use crate::error::{AppError, AppResult};
use bytes::Bytes;

/// Payloads shorter than this are served as `text/plain`.
pub const AUDIO_THRESHOLD_BYTES: usize = 100;

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const SYNTHESIS_PREFIX: &str = "[voice-relay speech placeholder] ";

/// What the encoder produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Output of the (placeholder) synthesizer
    Audio,
    /// Raw reply text substituted after an encoding failure
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechPayload {
    pub data: Bytes,
    pub kind: PayloadKind,
}

impl SpeechPayload {
    /// Text payload carrying `text` verbatim.
    pub fn text(text: &str) -> Self {
        Self {
            data: Bytes::copy_from_slice(text.as_bytes()),
            kind: PayloadKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Content type for the HTTP response, chosen by payload length.
    pub fn content_type(&self) -> &'static str {
        if self.data.len() < AUDIO_THRESHOLD_BYTES {
            TEXT_CONTENT_TYPE
        } else {
            AUDIO_CONTENT_TYPE
        }
    }
}

/// Placeholder text-to-speech encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeechEncoder;

impl SpeechEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, text: &str) -> AppResult<SpeechPayload> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Text to encode cannot be empty".to_string()));
        }

        let mut data = Vec::with_capacity(SYNTHESIS_PREFIX.len() + text.len());
        data.extend_from_slice(SYNTHESIS_PREFIX.as_bytes());
        data.extend_from_slice(text.as_bytes());

        Ok(SpeechPayload {
            data: Bytes::from(data),
            kind: PayloadKind::Audio,
        })
    }

    /// Payload used when [`Self::encode`] fails: the reply text itself.
    pub fn fallback(&self, text: &str) -> SpeechPayload {
        SpeechPayload::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prefixes_text() {
        let payload = SpeechEncoder::new().encode("Hello there").unwrap();
        assert_eq!(payload.kind, PayloadKind::Audio);
        assert!(payload.data.starts_with(SYNTHESIS_PREFIX.as_bytes()));
        assert!(payload.data.ends_with(b"Hello there"));
    }

    #[test]
    fn test_encode_rejects_empty() {
        assert!(SpeechEncoder::new().encode("  ").is_err());
    }

    #[test]
    fn test_content_type_by_length() {
        let short = SpeechPayload::text("short reply");
        assert_eq!(short.content_type(), TEXT_CONTENT_TYPE);

        let long = SpeechEncoder::new().encode(&"word ".repeat(40)).unwrap();
        assert!(long.len() >= AUDIO_THRESHOLD_BYTES);
        assert_eq!(long.content_type(), AUDIO_CONTENT_TYPE);
    }

    #[test]
    fn test_fallback_embeds_text() {
        let payload = SpeechEncoder::new().fallback("plain words");
        assert_eq!(payload.kind, PayloadKind::Text);
        assert_eq!(&payload.data[..], b"plain words");
    }
}
