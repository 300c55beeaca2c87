//! # Audio Input Module
//!
//! The two ways audio reaches the relay:
//! - **upload**: One multipart recording per chat request, parked in a
//!   temporary file that is deleted as soon as the request lets go of it
//! - **recording**: Chunks streamed over the WebSocket connection, appended to
//!   a per-connection file sink that is finalized exactly once

pub mod recording;
pub mod upload;

pub use recording::{RecordingSink, RecordingSummary};
pub use upload::UploadedAudio;
