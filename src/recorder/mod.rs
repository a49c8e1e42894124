//! Recording system module
//!
//! This module implements the capture pipeline:
//! - RecordingCoordinator state machine (idle → recording ⇄ paused → stopped)
//! - ChunkBuffer for encoder fragments
//! - Artifact finalizer producing the uploadable blob

pub mod artifact;
pub mod buffer;
pub mod coordinator;
pub mod error;
pub mod state;
mod ticker;

pub use artifact::{finalize, Artifact, ARTIFACT_EXTENSION, ARTIFACT_MIME_TYPE};
pub use buffer::ChunkBuffer;
pub use coordinator::{RecorderInput, RecordingCoordinator, RecordingEvent};
pub use error::{RecordingError, RecordingResult};
pub use state::{format_duration, CaptureSession, RecorderLimits, RecordingState};
