//! Recording coordinator
//!
//! Owns the capture lifecycle: acquires the capture source, buffers encoder
//! fragments, drives the one-second tick, enforces the duration ceiling and
//! finalizes the session once the encoder acknowledges the stop.
//!
//! Encoder data and ticks are queued and consumed one at a time through
//! [`RecordingCoordinator::handle_event`], so a transition is never
//! interleaved with an event.

use super::artifact::{self, Artifact};
use super::error::{RecordingError, RecordingResult};
use super::state::{CaptureSession, RecorderLimits, RecordingState};
use super::ticker::Ticker;
use crate::capture::{CaptureSource, EncoderEvent, EncoderSink, MediaEncoder};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Recording started
    Started,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// Recorded seconds so far
    Progress(u64),
    /// The ceiling is near; advisory only
    DurationWarning { remaining_secs: u64 },
    /// The ceiling was reached and a stop was forced
    AutoStopped,
    /// Stop requested, waiting for the encoder to flush
    Stopped,
    /// An artifact of `size` bytes was produced
    Finalized { size: usize },
    /// The session was discarded
    Cancelled,
    /// Error occurred
    Error(String),
}

/// An item from the recorder's event queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderInput {
    /// One second elapsed on the ticker with this epoch
    Tick(u64),
    /// Encoder output for the session with this generation
    Encoder { generation: u64, event: EncoderEvent },
}

/// Drives a single capture source through the recording lifecycle
pub struct RecordingCoordinator {
    /// Current recording state, readable from other tasks
    state: Arc<RwLock<RecordingState>>,

    limits: RecorderLimits,

    tick_period: Duration,

    source: Box<dyn CaptureSource>,

    /// Active session, present from `start()` until finalization
    session: Option<CaptureSession>,

    /// Running encoder, kept until it acknowledges the stop
    encoder: Option<Box<dyn MediaEncoder>>,

    ticker: Option<Ticker>,

    /// Bumped on every tick cancellation
    epoch: u64,

    /// Bumped on every `start()`
    generation: u64,

    encoder_tx: mpsc::UnboundedSender<(u64, EncoderEvent)>,
    encoder_rx: mpsc::UnboundedReceiver<(u64, EncoderEvent)>,
    tick_tx: mpsc::UnboundedSender<u64>,
    tick_rx: mpsc::UnboundedReceiver<u64>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingCoordinator {
    /// Create a coordinator around a capture source
    pub fn new(source: Box<dyn CaptureSource>, limits: RecorderLimits) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (encoder_tx, encoder_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            limits,
            tick_period: Duration::from_secs(1),
            source,
            session: None,
            encoder: None,
            ticker: None,
            epoch: 0,
            generation: 0,
            encoder_tx,
            encoder_rx,
            tick_tx,
            tick_rx,
            event_tx,
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    /// Shared read handle to the state for observers on other tasks
    pub fn state_handle(&self) -> Arc<RwLock<RecordingState>> {
        Arc::clone(&self.state)
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn limits(&self) -> RecorderLimits {
        self.limits
    }

    /// Seconds recorded in the current session
    pub fn elapsed_secs(&self) -> u64 {
        self.session.as_ref().map(|s| s.elapsed_secs).unwrap_or(0)
    }

    /// Fragments buffered in the current session
    pub fn chunk_count(&self) -> usize {
        self.session.as_ref().map(|s| s.chunks.len()).unwrap_or(0)
    }

    /// Whether a tick task is currently running
    pub fn has_active_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    /// Whether the capture source is currently held
    pub fn holds_capture(&self) -> bool {
        self.encoder.is_some()
    }

    fn set_state(&self, state: RecordingState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    fn invalid(&self, action: &'static str) -> RecordingError {
        RecordingError::InvalidTransition {
            action,
            state: self.state(),
        }
    }

    fn start_ticker(&mut self) {
        self.ticker = Some(Ticker::spawn(self.epoch, self.tick_period, self.tick_tx.clone()));
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.epoch += 1;
    }

    /// Start recording
    ///
    /// Valid only from idle. On acquisition failure the coordinator stays idle.
    pub async fn start(&mut self) -> RecordingResult<()> {
        if self.state() != RecordingState::Idle {
            return Err(self.invalid("start"));
        }

        self.generation += 1;
        let sink = EncoderSink::new(self.generation, self.encoder_tx.clone());

        tracing::info!("Acquiring capture source {}", self.source.id());
        let encoder = match self.source.acquire(sink).await {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::error!("Failed to acquire capture source: {}", e);
                self.emit(RecordingEvent::Error(e.to_string()));
                return Err(RecordingError::CaptureUnavailable(e));
            }
        };

        let session = CaptureSession::new();
        tracing::info!("Recording started, session {}", session.id);

        self.session = Some(session);
        self.encoder = Some(encoder);
        self.start_ticker();
        self.set_state(RecordingState::Recording);
        self.emit(RecordingEvent::Started);

        Ok(())
    }

    /// Pause recording
    pub fn pause(&mut self) -> RecordingResult<()> {
        if self.state() != RecordingState::Recording {
            return Err(self.invalid("pause"));
        }

        tracing::info!("Pausing recording at {}s", self.elapsed_secs());

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.pause();
        }
        self.cancel_ticker();
        self.set_state(RecordingState::Paused);
        self.emit(RecordingEvent::Paused);

        Ok(())
    }

    /// Resume recording
    pub fn resume(&mut self) -> RecordingResult<()> {
        if self.state() != RecordingState::Paused {
            return Err(self.invalid("resume"));
        }

        tracing::info!("Resuming recording at {}s", self.elapsed_secs());

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.resume();
        }
        self.start_ticker();
        self.set_state(RecordingState::Recording);
        self.emit(RecordingEvent::Resumed);

        Ok(())
    }

    /// Stop recording
    ///
    /// The artifact is produced once the encoder acknowledges the stop; see
    /// [`Self::handle_event`] and [`Self::run_until_finalized`].
    pub fn stop(&mut self) -> RecordingResult<()> {
        if !self.state().is_capturing() {
            return Err(self.invalid("stop"));
        }

        tracing::info!("Stopping recording at {}s", self.elapsed_secs());
        self.begin_stop();
        self.emit(RecordingEvent::Stopped);

        Ok(())
    }

    /// Encoder stop first, then track release, then wait for the flush
    fn begin_stop(&mut self) {
        self.cancel_ticker();
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.request_stop();
            encoder.release_tracks();
        }
        self.set_state(RecordingState::Stopped);
    }

    /// Discard the current session without producing an artifact
    pub fn cancel(&mut self) -> RecordingResult<()> {
        if self.state() == RecordingState::Idle {
            return Err(self.invalid("cancel"));
        }

        self.cancel_ticker();
        if let Some(mut encoder) = self.encoder.take() {
            encoder.release_tracks();
        }
        if let Some(session) = self.session.take() {
            tracing::info!(
                "Recording {} cancelled, discarding {} chunks",
                session.id,
                session.chunks.len()
            );
        }
        self.set_state(RecordingState::Idle);
        self.emit(RecordingEvent::Cancelled);

        Ok(())
    }

    /// One-second tick handler
    ///
    /// Only counts while recording. Reaching the ceiling forces a stop.
    pub fn tick(&mut self) {
        if self.state() != RecordingState::Recording {
            tracing::debug!("Ignoring tick while {}", self.state());
            return;
        }

        let limits = self.limits;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.elapsed_secs >= limits.max_duration_secs {
            return;
        }

        session.elapsed_secs += 1;
        let elapsed = session.elapsed_secs;
        self.emit(RecordingEvent::Progress(elapsed));

        if elapsed == limits.warning_at_secs && elapsed < limits.max_duration_secs {
            let remaining_secs = limits.max_duration_secs - elapsed;
            tracing::warn!("Recording will stop automatically in {}s", remaining_secs);
            self.emit(RecordingEvent::DurationWarning { remaining_secs });
        }

        if elapsed >= limits.max_duration_secs {
            tracing::info!("Maximum duration of {}s reached, stopping", limits.max_duration_secs);
            self.emit(RecordingEvent::AutoStopped);
            self.begin_stop();
            self.emit(RecordingEvent::Stopped);
        }
    }

    /// Process one queued event
    ///
    /// Returns the artifact when this event completed the session.
    pub fn handle_event(&mut self, input: RecorderInput) -> RecordingResult<Option<Artifact>> {
        match input {
            RecorderInput::Tick(epoch) => {
                let current = self.ticker.as_ref().map(|t| t.epoch());
                if current == Some(epoch) {
                    self.tick();
                } else {
                    tracing::debug!("Dropping stale tick from epoch {}", epoch);
                }
                Ok(None)
            }
            RecorderInput::Encoder { generation, event } => {
                if generation != self.generation {
                    tracing::debug!("Dropping encoder event from session generation {}", generation);
                    return Ok(None);
                }
                self.handle_encoder_event(event)
            }
        }
    }

    fn handle_encoder_event(&mut self, event: EncoderEvent) -> RecordingResult<Option<Artifact>> {
        let state = self.state();
        match event {
            EncoderEvent::Data(chunk) => {
                // Data queued before a pause or stop was produced while
                // recording; Stopped also accepts the flush preceding the ack
                match (state, self.session.as_mut()) {
                    (RecordingState::Idle, _) | (_, None) => {
                        tracing::warn!("Dropping {} byte chunk received while {}", chunk.len(), state)
                    }
                    (_, Some(session)) => {
                        let size = chunk.len();
                        if session.chunks.push(chunk) {
                            tracing::debug!("Buffered chunk #{} ({} bytes)", session.chunks.len(), size);
                        }
                    }
                }
                Ok(None)
            }
            EncoderEvent::Stopped => match state {
                RecordingState::Stopped => self.finish_session().map(Some),
                RecordingState::Recording | RecordingState::Paused => {
                    tracing::warn!("Encoder stopped on its own, finalizing what was captured");
                    self.begin_stop();
                    self.emit(RecordingEvent::Stopped);
                    self.finish_session().map(Some)
                }
                RecordingState::Idle => Ok(None),
            },
        }
    }

    /// Hand the buffered chunks to the finalizer and return to idle
    fn finish_session(&mut self) -> RecordingResult<Artifact> {
        self.encoder = None;
        let session = self.session.take();
        self.set_state(RecordingState::Idle);

        let result = match session {
            Some(session) => artifact::finalize(session.chunks, session.elapsed_secs, session.id),
            None => Err(RecordingError::EmptyCapture),
        };

        match &result {
            Ok(artifact) => {
                tracing::info!(
                    "Recording finalized: {} bytes, {}",
                    artifact.size(),
                    artifact.duration_label()
                );
                self.emit(RecordingEvent::Finalized {
                    size: artifact.size(),
                });
            }
            Err(e) => {
                tracing::warn!("Recording finalization failed: {}", e);
                self.emit(RecordingEvent::Error(e.to_string()));
            }
        }

        result
    }

    /// Wait for the next queued event
    ///
    /// Encoder output is drained before ticks.
    pub async fn next_event(&mut self) -> Option<RecorderInput> {
        tokio::select! {
            biased;
            Some((generation, event)) = self.encoder_rx.recv() => {
                Some(RecorderInput::Encoder { generation, event })
            }
            Some(epoch) = self.tick_rx.recv() => Some(RecorderInput::Tick(epoch)),
            else => None,
        }
    }

    /// Take the next queued event without waiting
    pub fn try_next_event(&mut self) -> Option<RecorderInput> {
        if let Ok((generation, event)) = self.encoder_rx.try_recv() {
            return Some(RecorderInput::Encoder { generation, event });
        }
        self.tick_rx.try_recv().ok().map(RecorderInput::Tick)
    }

    /// Process events until the session is finalized
    ///
    /// Covers both a user stop and the auto-stop at the ceiling.
    pub async fn run_until_finalized(&mut self) -> RecordingResult<Artifact> {
        if self.state() == RecordingState::Idle {
            return Err(self.invalid("wait for a recording"));
        }

        loop {
            let input = self
                .next_event()
                .await
                .ok_or(RecordingError::EventStreamClosed)?;
            if let Some(artifact) = self.handle_event(input)? {
                return Ok(artifact);
            }
        }
    }
}
