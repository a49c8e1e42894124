//! Screen capture through an FFmpeg child process
//!
//! FFmpeg grabs the screen and the default audio input and writes a WebM
//! stream to stdout. Stdout is read in fragments and forwarded to the
//! recorder as encoder data. Writing `q` to stdin asks FFmpeg to flush and
//! exit; end-of-stream on stdout is the stop acknowledgment.
//!
//! Pausing suspends the process (SIGSTOP/SIGCONT on Unix). Timestamps are
//! derived from frame and sample counts, so a pause leaves no gap in the
//! output.

use super::traits::{CaptureError, CaptureSource, EncoderSink, MediaEncoder};
use async_trait::async_trait;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Read size for stdout fragments
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Video timestamps from the frame count rather than the wall clock
const VIDEO_TIMESTAMPS: &str = "setpts=N/FRAME_RATE/TB";

/// Audio timestamps from the sample count rather than the wall clock
const AUDIO_TIMESTAMPS: &str = "asetpts=N/SR/TB";

/// Capture device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CaptureSettings {
    /// FFmpeg executable
    pub ffmpeg_path: String,

    /// Screen input (`:0.0` on X11, `1` on macOS, `desktop` on Windows)
    pub display: String,

    /// Audio input device name; `None` records video only
    pub audio_device: Option<String>,

    /// Capture frame rate
    pub framerate: u32,

    /// Video bitrate passed to the VP8 encoder
    pub video_bitrate: String,

    /// How long to wait for FFmpeg to fail on a denied or missing device
    pub startup_grace_ms: u64,

    /// How long FFmpeg may take to finish after `q` before it is killed
    pub stop_timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            display: default_display(),
            audio_device: Some(default_audio_device()),
            framerate: 30,
            video_bitrate: "2M".to_string(),
            startup_grace_ms: 500,
            stop_timeout_ms: 5000,
        }
    }
}

#[cfg(target_os = "macos")]
fn default_display() -> String {
    "1".to_string()
}

#[cfg(target_os = "windows")]
fn default_display() -> String {
    "desktop".to_string()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_display() -> String {
    std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string())
}

#[cfg(target_os = "macos")]
fn default_audio_device() -> String {
    "0".to_string()
}

#[cfg(target_os = "windows")]
fn default_audio_device() -> String {
    "Microphone".to_string()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_audio_device() -> String {
    "default".to_string()
}

impl CaptureSettings {
    /// Platform input arguments
    fn input_args(&self) -> Vec<String> {
        let fps = self.framerate.to_string();

        #[cfg(target_os = "macos")]
        {
            let audio = self.audio_device.clone().unwrap_or_else(|| "none".to_string());
            vec![
                "-f".into(),
                "avfoundation".into(),
                "-framerate".into(),
                fps,
                "-capture_cursor".into(),
                "1".into(),
                "-i".into(),
                format!("{}:{}", self.display, audio),
            ]
        }

        #[cfg(target_os = "windows")]
        {
            let mut args = vec![
                "-f".into(),
                "gdigrab".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                self.display.clone(),
            ];
            if let Some(ref audio) = self.audio_device {
                args.extend(["-f".into(), "dshow".into(), "-i".into(), format!("audio={}", audio)]);
            }
            args
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let mut args = vec![
                "-f".into(),
                "x11grab".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                self.display.clone(),
            ];
            if let Some(ref audio) = self.audio_device {
                args.extend(["-f".into(), "pulse".into(), "-i".into(), audio.clone()]);
            }
            args
        }
    }

    /// Full FFmpeg argument list, WebM on stdout
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        args.extend(self.input_args());
        args.extend(["-vf", VIDEO_TIMESTAMPS].iter().map(|s| s.to_string()));
        if self.audio_device.is_some() {
            args.extend(["-af", AUDIO_TIMESTAMPS].iter().map(|s| s.to_string()));
        }
        args.extend(
            [
                "-c:v",
                "libvpx",
                "-deadline",
                "realtime",
                "-cpu-used",
                "8",
                "-b:v",
                self.video_bitrate.as_str(),
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        if self.audio_device.is_some() {
            args.extend(["-c:a", "libopus"].iter().map(|s| s.to_string()));
        }
        args.extend(["-f", "webm", "-"].iter().map(|s| s.to_string()));
        args
    }
}

/// Capture source backed by an FFmpeg child process
pub struct FfmpegCaptureSource {
    id: String,
    settings: CaptureSettings,
}

impl FfmpegCaptureSource {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            id: format!("ffmpeg-{}", settings.display),
            settings,
        }
    }
}

#[async_trait]
impl CaptureSource for FfmpegCaptureSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn acquire(&mut self, sink: EncoderSink) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        let args = self.settings.ffmpeg_args();
        tracing::debug!("Spawning {} {}", self.settings.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CaptureError::DeviceUnavailable(format!(
                    "{} not found. Please install FFmpeg and add it to PATH.",
                    self.settings.ffmpeg_path
                )),
                std::io::ErrorKind::PermissionDenied => {
                    CaptureError::PermissionDenied(format!("Cannot execute {}: {}", self.settings.ffmpeg_path, e))
                }
                _ => CaptureError::Io(e),
            })?;

        // A denied or missing device makes FFmpeg exit right away
        tokio::time::sleep(Duration::from_millis(self.settings.startup_grace_ms)).await;
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            let message = stderr.trim().lines().last().unwrap_or("no output").to_string();
            tracing::warn!("FFmpeg exited during startup ({}): {}", status, message);
            return Err(if message.to_lowercase().contains("permission") {
                CaptureError::PermissionDenied(message)
            } else {
                CaptureError::DeviceUnavailable(message)
            });
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!("ffmpeg: {}", line);
                }
            });
        }

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::DeviceUnavailable("Failed to capture FFmpeg stdout".to_string()))?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let stop_timeout = Duration::from_millis(self.settings.stop_timeout_ms);
        tokio::spawn(pump(child, stdin, stdout, control_rx, sink, stop_timeout));

        tracing::info!("FFmpeg capture started on {}", self.settings.display);

        Ok(Box::new(FfmpegEncoder { control_tx }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Stop,
    Release,
}

/// Handle to the task that owns the FFmpeg process
///
/// Dropping the handle without a stop kills the process.
pub struct FfmpegEncoder {
    control_tx: mpsc::UnboundedSender<Control>,
}

impl FfmpegEncoder {
    fn control(&self, control: Control) {
        if self.control_tx.send(control).is_err() {
            tracing::debug!("FFmpeg task already finished, dropping {:?}", control);
        }
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn pause(&mut self) {
        self.control(Control::Pause);
    }

    fn resume(&mut self) {
        self.control(Control::Resume);
    }

    fn request_stop(&mut self) {
        self.control(Control::Stop);
    }

    fn release_tracks(&mut self) {
        self.control(Control::Release);
    }
}

/// Drain FFmpeg stdout into the sink while honoring control messages
///
/// A suspended process writes nothing, so stdout keeps being drained while
/// paused; what arrives was encoded before the pause. Where the process
/// cannot be suspended, reading stops instead and FFmpeg blocks on the full
/// pipe.
async fn pump(
    mut child: Child,
    mut stdin: Option<ChildStdin>,
    mut stdout: ChildStdout,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    sink: EncoderSink,
    stop_timeout: Duration,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut suspended = false;
    let mut blocked = false;
    let mut stopping = false;
    let mut stop_deadline: Option<Instant> = None;
    let mut controls_open = true;

    loop {
        buf.reserve(READ_CHUNK_SIZE);
        let deadline = stop_deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            control = control_rx.recv(), if controls_open => match control {
                Some(Control::Pause) => {
                    if suspend(&child) {
                        suspended = true;
                    } else {
                        blocked = true;
                    }
                }
                Some(Control::Resume) => {
                    if suspended && resume(&child) {
                        suspended = false;
                    }
                    blocked = false;
                }
                Some(Control::Stop) => {
                    stopping = true;
                    blocked = false;
                    if suspended && resume(&child) {
                        suspended = false;
                    }
                    if request_quit(stdin.as_mut()).await {
                        stop_deadline = Some(Instant::now() + stop_timeout);
                    } else {
                        kill(&mut child);
                    }
                }
                Some(Control::Release) => {
                    drop(stdin.take());
                    if !stopping {
                        blocked = false;
                        kill(&mut child);
                    }
                }
                None => {
                    // Encoder handle dropped without a stop; tear the process down
                    controls_open = false;
                    blocked = false;
                    drop(stdin.take());
                    kill(&mut child);
                }
            },
            read = stdout.read_buf(&mut buf), if !blocked => match read {
                Ok(0) => break,
                Ok(n) => {
                    tracing::trace!("FFmpeg produced {} bytes", n);
                    if !sink.data(buf.split().freeze()) {
                        kill(&mut child);
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read FFmpeg output: {}", e);
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline), if stop_deadline.is_some() => {
                tracing::warn!("FFmpeg still running {:?} after the stop request, killing it", stop_timeout);
                stop_deadline = None;
                kill(&mut child);
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => tracing::info!("FFmpeg capture finished"),
        Ok(status) => tracing::warn!("FFmpeg exited with status {}", status),
        Err(e) => tracing::warn!("Failed to wait for FFmpeg: {}", e),
    }

    sink.stopped();
}

/// Write `q` to FFmpeg's stdin; false if it could not be delivered
async fn request_quit(stdin: Option<&mut ChildStdin>) -> bool {
    let Some(pipe) = stdin else {
        return false;
    };
    if let Err(e) = pipe.write_all(b"q").await {
        tracing::warn!("Failed to ask FFmpeg to quit: {}", e);
        return false;
    }
    let _ = pipe.flush().await;
    true
}

fn kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to kill FFmpeg: {}", e);
    }
}

#[cfg(unix)]
fn signal(child: &Child, signal: libc::c_int) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: kill(2) on the pid of a child we own and have not reaped
    if unsafe { libc::kill(pid as libc::pid_t, signal) } == 0 {
        true
    } else {
        tracing::warn!("Failed to signal FFmpeg: {}", std::io::Error::last_os_error());
        false
    }
}

#[cfg(unix)]
fn suspend(child: &Child) -> bool {
    signal(child, libc::SIGSTOP)
}

#[cfg(unix)]
fn resume(child: &Child) -> bool {
    signal(child, libc::SIGCONT)
}

#[cfg(not(unix))]
fn suspend(_child: &Child) -> bool {
    false
}

#[cfg(not(unix))]
fn resume(_child: &Child) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::EncoderEvent;

    #[test]
    fn test_args_end_with_webm_on_stdout() {
        let args = CaptureSettings::default().ffmpeg_args();
        let tail: Vec<&str> = args.iter().rev().take(3).map(|s| s.as_str()).collect();
        assert_eq!(tail, vec!["-", "webm", "-f"]);
        assert!(args.iter().any(|a| a == "libopus"));
        assert!(args.iter().any(|a| a == "setpts=N/FRAME_RATE/TB"));
        assert!(args.iter().any(|a| a == "asetpts=N/SR/TB"));
    }

    #[test]
    fn test_video_only_skips_audio_codec() {
        let settings = CaptureSettings {
            audio_device: None,
            ..CaptureSettings::default()
        };
        let args = settings.ffmpeg_args();
        assert!(!args.iter().any(|a| a == "libopus"));
        assert!(!args.iter().any(|a| a == "-af"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let mut source = FfmpegCaptureSource::new(CaptureSettings {
            ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
            ..CaptureSettings::default()
        });
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = source.acquire(EncoderSink::new(0, tx)).await;
        assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
    }

    /// Stand-in encoder: prints a counter every 100ms and ignores stdin
    #[cfg(unix)]
    fn counter_encoder(dir: &std::path::Path) -> CaptureSettings {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg.sh");
        std::fs::write(
            &path,
            "#!/bin/sh\ni=0\nwhile [ $i -lt 600 ]; do\n  i=$((i+1))\n  echo $i\n  sleep 0.1\ndone\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        CaptureSettings {
            ffmpeg_path: path.to_string_lossy().into_owned(),
            startup_grace_ms: 50,
            stop_timeout_ms: 300,
            ..CaptureSettings::default()
        }
    }

    #[cfg(unix)]
    fn drain_lines(rx: &mut mpsc::UnboundedReceiver<(u64, EncoderEvent)>) -> Vec<String> {
        let mut text = String::new();
        while let Ok((_, event)) = rx.try_recv() {
            if let EncoderEvent::Data(chunk) = event {
                text.push_str(&String::from_utf8_lossy(&chunk));
            }
        }
        text.lines().map(str::to_string).collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pause_suspends_the_encoder_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegCaptureSource::new(counter_encoder(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = source.acquire(EncoderSink::new(1, tx)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        encoder.pause();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before = drain_lines(&mut rx);
        assert!(!before.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let during = drain_lines(&mut rx);
        assert!(during.is_empty(), "output while paused: {:?}", during);

        encoder.resume();
        tokio::time::sleep(Duration::from_millis(250)).await;
        let after = drain_lines(&mut rx);
        assert!(after.len() <= 4, "backlog after resume: {:?}", after);
        assert!(!after.is_empty());

        encoder.release_tracks();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_kills_an_encoder_that_ignores_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegCaptureSource::new(counter_encoder(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = source.acquire(EncoderSink::new(1, tx)).await.unwrap();

        encoder.request_stop();
        encoder.release_tracks();

        let stopped = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some((_, event)) = rx.recv().await {
                if event == EncoderEvent::Stopped {
                    return true;
                }
            }
            false
        })
        .await;
        assert_eq!(stopped, Ok(true));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_while_paused_still_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FfmpegCaptureSource::new(counter_encoder(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = source.acquire(EncoderSink::new(1, tx)).await.unwrap();

        encoder.pause();
        encoder.request_stop();

        let stopped = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some((_, event)) = rx.recv().await {
                if event == EncoderEvent::Stopped {
                    return true;
                }
            }
            false
        })
        .await;
        assert_eq!(stopped, Ok(true));
    }
}
