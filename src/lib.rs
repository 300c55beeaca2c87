//! # Voice Relay
//!
//! A voice-conversation relay: a client uploads a short recording, the relay
//! transcribes it, asks a language model for a reply in the context of the
//! session's history, and returns the reply as a speech payload.
//!
//! ## Architecture:
//! - **config**: Layered configuration (defaults, `config.toml`, environment)
//! - **error**: `AppError` and its HTTP mapping
//! - **audio**: Uploaded recordings and streamed recording sinks
//! - **transcription**: Speech-to-text client
//! - **generation**: Language-model client and keyword fallback
//! - **speech**: Reply encoding
//! - **conversation**: Session history and the per-turn orchestrator
//! - **state**, **handlers**, **health**, **middleware**, **websocket**: HTTP surface

pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod speech;
pub mod state;
pub mod transcription;
pub mod websocket;
