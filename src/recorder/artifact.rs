//! Artifact finalizer
//!
//! Turns the buffered fragments of a stopped session into one immutable blob.

use super::buffer::ChunkBuffer;
use super::error::{RecordingError, RecordingResult};
use super::state::format_duration;
use bytes::{Bytes, BytesMut};
use std::path::Path;
use uuid::Uuid;

/// MIME type of every finalized capture
pub const ARTIFACT_MIME_TYPE: &str = "video/webm";

/// File extension matching [`ARTIFACT_MIME_TYPE`]
pub const ARTIFACT_EXTENSION: &str = "webm";

/// A finalized recording, ready to be uploaded
#[derive(Debug, Clone)]
pub struct Artifact {
    data: Bytes,
    mime_type: &'static str,
    duration_secs: u64,
    session_id: Uuid,
}

impl Artifact {
    /// Wrap an already-encoded file, e.g. one picked from disk
    pub fn from_bytes(data: Bytes, duration_secs: u64) -> RecordingResult<Self> {
        if data.is_empty() {
            return Err(RecordingError::EmptyCapture);
        }
        Ok(Self {
            data,
            mime_type: ARTIFACT_MIME_TYPE,
            duration_secs,
            session_id: Uuid::new_v4(),
        })
    }

    /// Encoded media bytes. Cloning is cheap.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Recorded time in seconds, excluding pauses
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Recorded time as `m:ss`
    pub fn duration_label(&self) -> String {
        format_duration(self.duration_secs)
    }

    /// Capture session this artifact came from
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Write the artifact to a local file
    pub async fn write_to(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, &self.data).await?;
        tracing::debug!("Wrote {} bytes to {:?}", self.size(), path);
        Ok(())
    }
}

/// Concatenate a session's fragments into a single artifact
///
/// Fails with [`RecordingError::EmptyCapture`] when no fragment was recorded.
pub fn finalize(
    chunks: ChunkBuffer,
    duration_secs: u64,
    session_id: Uuid,
) -> RecordingResult<Artifact> {
    if chunks.is_empty() {
        return Err(RecordingError::EmptyCapture);
    }

    let mut data = BytesMut::with_capacity(chunks.total_bytes());
    for chunk in chunks.into_chunks() {
        data.extend_from_slice(&chunk);
    }

    Ok(Artifact {
        data: data.freeze(),
        mime_type: ARTIFACT_MIME_TYPE,
        duration_secs,
        session_id,
    })
}
