//! # Conversation Module
//!
//! ## Key Components:
//! - **SessionStore**: Bounded per-session message history
//! - **ConversationOrchestrator**: Runs a voice turn through transcription,
//!   generation, and encoding, substituting fallbacks where a stage fails

pub mod orchestrator;
pub mod store;

pub use orchestrator::{ConversationOrchestrator, PipelineStage, TurnOutcome};
pub use store::{Message, Role, SessionStore};
