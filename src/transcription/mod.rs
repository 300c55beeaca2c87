//! # Transcription Module
//!
//! Turns recorded audio into text by way of an external transcription service.
//!
//! ## Key Components:
//! - **SpeechToText**: The seam the orchestrator depends on
//! - **AssemblyAiTranscriber**: Upload → submit job → poll until completed
//!
//! This module never substitutes placeholder text on failure; deciding what to
//! say when transcription fails belongs to the orchestrator.

pub mod client;

use crate::error::AppResult;
use async_trait::async_trait;
use bytes::Bytes;

pub use client::AssemblyAiTranscriber;

/// Speech-to-text backend.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a complete audio recording.
    async fn transcribe(&self, audio: Bytes) -> AppResult<String>;
}
