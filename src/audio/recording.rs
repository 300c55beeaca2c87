//! # Streamed Recording Sink
//!
//! One sink per WebSocket connection (or per recording within a connection).
//! Chunks are written strictly in arrival order. A sink is finalized exactly
//! once: explicitly through [`RecordingSink::finish`], or by `Drop` when the
//! connection dies without a stop signal. Recordings below the configured
//! minimum size are deleted instead of kept.
//!
//! ## Lifecycle:
//! 1. **Open**: file created in the recordings directory
//! 2. **Writing**: binary frames appended
//! 3. **Finished**: flushed and closed (kept) or removed (undersized)

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of finalizing a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub chunks: u64,
    /// `false` when the recording was too small and got deleted
    pub kept: bool,
}

/// Append-only file sink for streamed audio.
#[derive(Debug)]
pub struct RecordingSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
    chunks: u64,
    min_bytes: u64,
    opened_at: DateTime<Utc>,
}

impl RecordingSink {
    /// Create `dir/<name>`, creating `dir` if needed.
    pub fn create(dir: &Path, name: &str, min_bytes: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        let file = File::create(&path)?;
        debug!(path = %path.display(), "Opened recording sink");

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
            chunks: 0,
            min_bytes,
            opened_at: Utc::now(),
        })
    }

    /// Append one chunk. Returns the running total.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<u64> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "recording sink already finalized"))?;
        writer.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        self.chunks += 1;
        Ok(self.bytes_written)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the sink, deleting it if undersized.
    pub fn finish(mut self) -> io::Result<RecordingSummary> {
        self.finalize()
    }

    fn finalize(&mut self) -> io::Result<RecordingSummary> {
        let flushed = match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        };

        let kept = self.bytes_written >= self.min_bytes;
        if !kept {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        flushed?;

        let summary = RecordingSummary {
            filename: self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: self.path.clone(),
            bytes: self.bytes_written,
            chunks: self.chunks,
            kept,
        };

        let seconds_open = (Utc::now() - self.opened_at).num_milliseconds() as f64 / 1000.0;
        info!(
            filename = %summary.filename,
            bytes = summary.bytes,
            chunks = summary.chunks,
            kept,
            seconds_open,
            "Recording finalized"
        );
        Ok(summary)
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.finalize() {
                warn!(path = %self.path.display(), error = %e, "Failed to finalize recording on drop");
            }
        }
    }
}
