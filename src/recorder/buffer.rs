//! Chunk buffer
//!
//! Append-only, ordered storage for encoded fragments of one capture session.

use bytes::Bytes;

/// Ordered sequence of encoded media fragments
///
/// There is exactly one producer per session. Fragments are never removed
/// or reordered; the buffer is consumed whole by the finalizer.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Bytes>,
    total_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Empty fragments are ignored.
    ///
    /// Returns whether the fragment was stored.
    pub fn push(&mut self, chunk: Bytes) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of all fragment sizes
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    /// Consume the buffer, yielding fragments in arrival order
    pub fn into_chunks(self) -> Vec<Bytes> {
        self.chunks
    }
}
