//! Capture trait definitions
//!
//! Platform-agnostic seams between the recorder and a live screen source.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while acquiring or driving a capture source
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events delivered by a running encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A newly encoded fragment
    Data(Bytes),
    /// The encoder has flushed; no further fragments will arrive
    Stopped,
}

/// Where an encoder delivers its events
///
/// Every event is tagged with the generation of the session that created
/// the sink, so late events from an abandoned encoder can be told apart.
#[derive(Debug, Clone)]
pub struct EncoderSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, EncoderEvent)>,
}

impl EncoderSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, EncoderEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Deliver an event. Returns false once the recorder is gone.
    pub fn send(&self, event: EncoderEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn data(&self, chunk: impl Into<Bytes>) -> bool {
        self.send(EncoderEvent::Data(chunk.into()))
    }

    pub fn stopped(&self) -> bool {
        self.send(EncoderEvent::Stopped)
    }
}

/// A running encoder attached to an acquired capture stream
///
/// Control calls return immediately; effects are reported through the
/// [`EncoderSink`] handed over at acquisition time.
pub trait MediaEncoder: Send {
    /// Stop emitting fragments until resumed
    fn pause(&mut self);

    /// Continue emitting fragments after a pause
    fn resume(&mut self);

    /// Flush pending data. Must be answered by [`EncoderEvent::Stopped`].
    fn request_stop(&mut self);

    /// Release the underlying screen and audio tracks
    fn release_tracks(&mut self);
}

/// An OS-level screen + audio source
#[async_trait]
pub trait CaptureSource: Send {
    /// Source identifier used in logs
    fn id(&self) -> &str;

    /// Acquire the source and start encoding into `sink`
    async fn acquire(&mut self, sink: EncoderSink) -> Result<Box<dyn MediaEncoder>, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EncoderSink::new(7, tx);

        assert!(sink.data(Bytes::from_static(b"x")));
        assert!(sink.stopped());

        assert_eq!(
            rx.try_recv().unwrap(),
            (7, EncoderEvent::Data(Bytes::from_static(b"x")))
        );
        assert_eq!(rx.try_recv().unwrap(), (7, EncoderEvent::Stopped));
    }

    #[test]
    fn test_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EncoderSink::new(0, tx);
        drop(rx);
        assert!(!sink.stopped());
    }
}
