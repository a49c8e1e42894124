//! Recording state management
//!
//! Defines the recording state machine states and the transient capture session.

use super::buffer::ChunkBuffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard ceiling on a single capture, in seconds (15 minutes)
pub const DEFAULT_MAX_DURATION_SECS: u64 = 900;

/// Elapsed time at which the "recording is about to end" warning fires
pub const DEFAULT_WARNING_AT_SECS: u64 = 780;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Stop requested, waiting for the encoder to flush
    Stopped,
}

impl RecordingState {
    /// Whether the capture source is held in this state
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "idle"),
            RecordingState::Recording => write!(f, "recording"),
            RecordingState::Paused => write!(f, "paused"),
            RecordingState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Limits applied to every capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RecorderLimits {
    /// Session is auto-stopped once this many seconds have been recorded
    pub max_duration_secs: u64,

    /// Advisory warning threshold
    pub warning_at_secs: u64,
}

impl Default for RecorderLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            warning_at_secs: DEFAULT_WARNING_AT_SECS,
        }
    }
}

/// A single capture, from `start()` to finalization
///
/// Owned by the coordinator and destroyed once it has been finalized or
/// discarded.
#[derive(Debug)]
pub struct CaptureSession {
    /// Session identifier for log correlation
    pub id: Uuid,

    /// Wall-clock time the capture started
    pub started_at: DateTime<Utc>,

    /// Seconds spent in the recording state
    pub elapsed_secs: u64,

    /// Encoded fragments in arrival order
    pub chunks: ChunkBuffer,
}

impl CaptureSession {
    /// Create a new session starting now
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            elapsed_secs: 0,
            chunks: ChunkBuffer::new(),
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Format seconds as `m:ss`
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(780), "13:00");
        assert_eq!(format_duration(900), "15:00");
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&RecordingState::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        assert!(RecordingState::Paused.is_capturing());
        assert!(!RecordingState::Stopped.is_capturing());
    }
}
