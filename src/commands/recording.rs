//! Record command
//!
//! Captures the screen until stopped, then collects metadata and saves the
//! recording to the library.

use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::capture::FfmpegCaptureSource;
use crate::catalog::RecordingRecord;
use crate::config::HarvestConfig;
use crate::recorder::{
    format_duration, Artifact, RecordingCoordinator, RecordingError, RecordingEvent, RecordingState,
    ARTIFACT_EXTENSION,
};
use crate::upload::{UploadError, ValidationError, Workspace};
use crate::utils::error::AppResult;

/// Line-oriented terminal input
pub type InputLines = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> InputLines {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Metadata given on the command line; missing fields are prompted for
#[derive(Debug, Clone, Default)]
pub struct MetadataArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

/// Keyboard commands accepted while recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    TogglePause,
    Stop,
    Cancel,
}

impl Control {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "resume" => Some(Control::TogglePause),
            "s" | "stop" => Some(Control::Stop),
            "c" | "cancel" => Some(Control::Cancel),
            _ => None,
        }
    }
}

/// Record, then save to the library
///
/// Returns `None` when the recording is cancelled or the draft is discarded.
pub async fn record(
    config: &HarvestConfig,
    workspace: &mut Workspace,
    args: MetadataArgs,
    keep: Option<PathBuf>,
) -> AppResult<Option<RecordingRecord>> {
    let source = FfmpegCaptureSource::new(config.capture.clone());
    let mut coordinator = RecordingCoordinator::new(Box::new(source), config.limits);
    let mut input = stdin_lines();

    let Some(artifact) = capture(&mut coordinator, &mut input).await? else {
        eprintln!("Recording discarded.");
        return Ok(None);
    };

    eprintln!(
        "Captured {} ({} bytes).",
        artifact.duration_label(),
        artifact.size()
    );

    if let Some(path) = keep {
        artifact.write_to(&path).await?;
        eprintln!("Local copy written to {}", path.display());
    }

    workspace.stage(artifact, &config.creator);
    fill_metadata(workspace, args, &mut input).await?;
    save_with_retry(workspace, &mut input).await
}

/// Run the capture loop until an artifact is produced or the user cancels
pub async fn capture(
    coordinator: &mut RecordingCoordinator,
    input: &mut InputLines,
) -> AppResult<Option<Artifact>> {
    let mut notices = coordinator.subscribe();
    coordinator.start().await?;

    eprintln!(
        "Recording (limit {}). Type p + Enter to pause/resume, s to stop, c to cancel.",
        format_duration(coordinator.limits().max_duration_secs)
    );

    let mut input_open = true;
    let mut notices_open = true;

    loop {
        tokio::select! {
            next = coordinator.next_event() => {
                let Some(event) = next else {
                    return Err(RecordingError::EventStreamClosed.into());
                };
                if let Some(artifact) = coordinator.handle_event(event)? {
                    return Ok(Some(artifact));
                }
            }
            line = input.next_line(), if input_open => {
                match line? {
                    Some(line) => match Control::parse(&line) {
                        Some(Control::Cancel) => {
                            coordinator.cancel()?;
                            return Ok(None);
                        }
                        Some(control) => apply(coordinator, control),
                        None if line.trim().is_empty() => {}
                        None => eprintln!("Unknown command {:?}", line.trim()),
                    },
                    None => {
                        input_open = false;
                        if coordinator.state().is_capturing() {
                            apply(coordinator, Control::Stop);
                        }
                    }
                }
            }
            notice = notices.recv(), if notices_open => {
                match notice {
                    Ok(notice) => report(&notice),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Skipped {} recording notices", skipped);
                    }
                    Err(RecvError::Closed) => notices_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                coordinator.cancel()?;
                return Ok(None);
            }
        }
    }
}

fn apply(coordinator: &mut RecordingCoordinator, control: Control) {
    let result = match control {
        Control::TogglePause if coordinator.state() == RecordingState::Paused => coordinator.resume(),
        Control::TogglePause => coordinator.pause(),
        Control::Stop => coordinator.stop(),
        Control::Cancel => coordinator.cancel(),
    };
    if let Err(e) = result {
        tracing::warn!("{}", e);
        eprintln!("{}", e);
    }
}

fn report(event: &RecordingEvent) {
    match event {
        RecordingEvent::Progress(secs) if secs % 10 == 0 => {
            eprintln!("  {}", format_duration(*secs));
        }
        RecordingEvent::Paused => eprintln!("Paused."),
        RecordingEvent::Resumed => eprintln!("Resumed."),
        RecordingEvent::DurationWarning { remaining_secs } => {
            eprintln!("Recording stops automatically in {}.", format_duration(*remaining_secs));
        }
        RecordingEvent::AutoStopped => eprintln!("Maximum duration reached, stopping."),
        RecordingEvent::Stopped => eprintln!("Stopping, finishing the file..."),
        RecordingEvent::Error(message) => eprintln!("Error: {}", message),
        _ => {}
    }
}

/// Ask for one line; `None` once input is exhausted
async fn prompt(input: &mut InputLines, label: &str) -> AppResult<Option<String>> {
    eprint!("{}: ", label);
    Ok(input.next_line().await?)
}

/// Fill the staged draft from arguments and prompts
pub async fn fill_metadata(
    workspace: &mut Workspace,
    args: MetadataArgs,
    input: &mut InputLines,
) -> AppResult<()> {
    let title = match args.title {
        Some(title) => title,
        None => prompt(input, "Title").await?.unwrap_or_default(),
    };
    let description = match args.description {
        Some(description) => description,
        None => prompt(input, "Description (optional)").await?.unwrap_or_default(),
    };
    let tags = match args.tags {
        Some(tags) => tags,
        None => prompt(input, "Tags, comma separated (optional)").await?.unwrap_or_default(),
    };

    if let Some(draft) = workspace.draft_mut() {
        draft.metadata = draft
            .metadata
            .clone()
            .with_title(title)
            .with_description(description)
            .with_tags_text(&tags);
    }
    Ok(())
}

/// Save the draft, asking the user what to do after a recoverable failure
///
/// A draft that cannot be saved is written to the working directory
/// before giving up.
pub async fn save_with_retry(
    workspace: &mut Workspace,
    input: &mut InputLines,
) -> AppResult<Option<RecordingRecord>> {
    loop {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });

        let result = workspace.save_draft(&cancel).await;
        watcher.abort();

        let error = match result {
            Ok(record) => {
                eprintln!("Saved as recording {}.", record.id);
                return Ok(Some(record));
            }
            Err(e) => e,
        };

        tracing::warn!("{}", error);
        eprintln!("{}", error);

        let fixed = match error {
            UploadError::Validation(ValidationError::MissingTitle) => {
                match prompt(input, "Title").await?.filter(|t| !t.trim().is_empty()) {
                    Some(title) => {
                        if let Some(draft) = workspace.draft_mut() {
                            draft.metadata.title = title;
                        }
                        true
                    }
                    None => false,
                }
            }
            UploadError::Validation(ValidationError::DescriptionTooLong { .. }) => {
                match prompt(input, "Shorter description").await? {
                    Some(description) => {
                        if let Some(draft) = workspace.draft_mut() {
                            draft.metadata = draft.metadata.clone().with_description(description);
                        }
                        true
                    }
                    None => false,
                }
            }
            ref e if e.is_retryable() => matches!(
                prompt(input, "Retry upload? [y/N]").await?,
                Some(answer) if answer.trim().eq_ignore_ascii_case("y")
            ),
            _ => false,
        };

        if !fixed {
            preserve_draft(workspace).await?;
            return Err(error.into());
        }
    }
}

/// Write the unsaved draft to disk so the capture is not lost
async fn preserve_draft(workspace: &mut Workspace) -> AppResult<()> {
    if let Some(draft) = workspace.discard_draft() {
        let path = PathBuf::from(format!(
            "recording-{}.{}",
            draft.artifact.session_id(),
            ARTIFACT_EXTENSION
        ));
        draft.artifact.write_to(&path).await?;
        eprintln!("Unsaved recording kept at {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_parse() {
        assert_eq!(Control::parse(" P "), Some(Control::TogglePause));
        assert_eq!(Control::parse("stop"), Some(Control::Stop));
        assert_eq!(Control::parse("c"), Some(Control::Cancel));
        assert_eq!(Control::parse("x"), None);
    }
}
