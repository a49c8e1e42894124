//! Recording errors

use super::state::RecordingState;
use crate::capture::CaptureError;
use thiserror::Error;

/// Errors raised by the recording state machine
#[derive(Error, Debug)]
pub enum RecordingError {
    /// The capture source could not be acquired (permission or device denial)
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(#[source] CaptureError),

    /// The session stopped before the encoder produced any data
    #[error("Nothing to save: the recording produced no data")]
    EmptyCapture,

    /// The requested transition is not valid from the current state
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RecordingState,
    },

    /// The encoder event queue closed before the stop acknowledgment arrived
    #[error("Encoder event stream closed unexpectedly")]
    EventStreamClosed,
}

pub type RecordingResult<T> = Result<T, RecordingError>;
