//! Screen + audio capture sources
//!
//! This module provides the capture seam used by the recorder and the
//! FFmpeg-backed implementation used by the CLI.

pub mod ffmpeg;
pub mod traits;

pub use ffmpeg::{CaptureSettings, FfmpegCaptureSource};
pub use traits::{CaptureError, CaptureSource, EncoderEvent, EncoderSink, MediaEncoder};
