//! # Uploaded Audio
//!
//! Reads the `audio` field of a multipart request into a temporary file under
//! the upload directory. The file belongs to the [`UploadedAudio`] value and is
//! removed when that value is dropped, so every exit path of a request
//! (success, fallback, or early error) cleans up after itself.

use crate::error::{AppError, AppResult};
use actix_multipart::{Field, Multipart};
use bytes::{Bytes, BytesMut};
use futures_util::stream::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Name of the multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

/// An uploaded recording backed by a temporary file.
#[derive(Debug)]
pub struct UploadedAudio {
    file: NamedTempFile,
    size: usize,
    filename: Option<String>,
    content_type: Option<String>,
}

impl UploadedAudio {
    /// Pull the audio field out of a multipart payload.
    ///
    /// Stops reading as soon as the field grows past `max_bytes`.
    pub async fn from_multipart(
        mut payload: Multipart,
        upload_dir: &Path,
        max_bytes: usize,
    ) -> AppResult<Self> {
        while let Some(item) = payload.next().await {
            let mut field: Field =
                item.map_err(|e| AppError::Validation(format!("Multipart error: {}", e)))?;

            let (field_name, filename) = match field.content_disposition() {
                Some(disposition) => (
                    disposition.get_name().map(str::to_string),
                    disposition.get_filename().map(str::to_string),
                ),
                None => (None, None),
            };
            if field_name.as_deref() != Some(AUDIO_FIELD) {
                continue;
            }

            let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
            if let Some(mime) = content_type.as_deref() {
                if !is_audio_mime(mime) {
                    return Err(AppError::Validation(format!(
                        "Unsupported file type '{}'. Only audio files are allowed",
                        mime
                    )));
                }
            }

            let mut bytes = BytesMut::new();
            while let Some(chunk) = field.next().await {
                let chunk =
                    chunk.map_err(|e| AppError::Validation(format!("Chunk error: {}", e)))?;
                if bytes.len() + chunk.len() > max_bytes {
                    return Err(too_large(max_bytes));
                }
                bytes.extend_from_slice(&chunk);
            }

            let mut audio = Self::from_bytes(upload_dir, bytes.freeze()).await?;
            audio.filename = filename;
            audio.content_type = content_type;
            return Ok(audio);
        }

        Err(AppError::Validation("No audio file provided".to_string()))
    }

    /// Park `bytes` in a fresh temporary file under `upload_dir`.
    pub async fn from_bytes(upload_dir: &Path, bytes: Bytes) -> AppResult<Self> {
        tokio::fs::create_dir_all(upload_dir).await?;
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".audio")
            .tempfile_in(upload_dir)?;
        tokio::fs::write(file.path(), &bytes).await?;

        debug!(path = %file.path().display(), size = bytes.len(), "Stored uploaded audio");
        Ok(Self {
            file,
            size: bytes.len(),
            filename: None,
            content_type: None,
        })
    }

    /// Read the whole recording back into memory.
    pub async fn read(&self) -> AppResult<Bytes> {
        let data = tokio::fs::read(self.file.path()).await?;
        Ok(Bytes::from(data))
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Browsers label MediaRecorder output inconsistently, so accept the usual suspects.
fn is_audio_mime(mime: &str) -> bool {
    mime.starts_with("audio/") || mime == "video/webm" || mime == "application/octet-stream"
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::Validation(format!(
        "Audio file too large (max: {} bytes)",
        max_bytes
    ))
}
