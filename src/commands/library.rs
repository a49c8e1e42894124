//! Library commands
//!
//! Browse, fetch and manage recordings stored on the recordings service.

use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::recording::{fill_metadata, save_with_retry, stdin_lines, MetadataArgs};
use crate::catalog::{RecordingId, RecordingQuery, RecordingRecord};
use crate::config::HarvestConfig;
use crate::recorder::{Artifact, ARTIFACT_EXTENSION};
use crate::upload::{HealthStatus, HttpStorageClient, Workspace};
use crate::utils::error::{AppError, AppResult};

/// Client-side narrowing applied after the service query
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub text: String,
    pub tags: Vec<String>,
}

/// List recordings
pub async fn list(
    workspace: &mut Workspace,
    query: &RecordingQuery,
    filter: &ListFilter,
    json: bool,
) -> AppResult<()> {
    let total = workspace.refresh(query).await?;
    let records = workspace.catalog().filter(&filter.text, &filter.tags);
    tracing::debug!("Showing {} of {} recordings", records.len(), total);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("No recordings found.");
        return Ok(());
    }
    for record in records {
        println!("{}", summary_line(record));
    }
    Ok(())
}

/// Show one recording
pub async fn show(workspace: &Workspace, id: &RecordingId, json: bool) -> AppResult<()> {
    let record = workspace.get(id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", details(&record));
    }
    Ok(())
}

pub async fn delete(workspace: &mut Workspace, id: &RecordingId) -> AppResult<()> {
    workspace.delete(id).await?;
    eprintln!("Deleted recording {}.", id);
    Ok(())
}

/// Download a recording's media; returns the written path
pub async fn download(
    workspace: &Workspace,
    id: &RecordingId,
    output: Option<PathBuf>,
) -> AppResult<PathBuf> {
    let record = workspace.get(id).await?;
    let data = workspace.uploader().client().fetch_media(&record).await?;

    let path = output.unwrap_or_else(|| PathBuf::from(record.download_file_name(ARTIFACT_EXTENSION)));
    tokio::fs::write(&path, &data).await?;

    tracing::info!("Downloaded recording {} to {:?} ({} bytes)", id, path, data.len());
    eprintln!("Saved {} ({} bytes).", path.display(), data.len());
    Ok(path)
}

/// Print the distinct tags in use
pub async fn tags(workspace: &mut Workspace) -> AppResult<()> {
    workspace.refresh(&RecordingQuery::default()).await?;
    for tag in workspace.catalog().all_tags() {
        println!("{}", tag);
    }
    Ok(())
}

pub async fn health(client: &HttpStorageClient) -> AppResult<HealthStatus> {
    let status = client.health().await?;
    println!(
        "{} is {}{}",
        client.base_url(),
        status.status,
        status
            .timestamp
            .as_deref()
            .map(|t| format!(" ({})", t))
            .unwrap_or_default()
    );
    Ok(status)
}

/// Upload an existing WebM file as a new recording
pub async fn upload(
    config: &HarvestConfig,
    workspace: &mut Workspace,
    path: &Path,
    duration_secs: u64,
    args: MetadataArgs,
) -> AppResult<Option<RecordingRecord>> {
    if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
        return Err(AppError::Input(format!(
            "{} is not a .{} file",
            path.display(),
            ARTIFACT_EXTENSION
        )));
    }

    let data = tokio::fs::read(path).await?;
    let artifact = Artifact::from_bytes(Bytes::from(data), duration_secs)?;
    tracing::info!("Uploading {:?} as session {}", path, artifact.session_id());

    let mut input = stdin_lines();
    workspace.stage(artifact, &config.creator);
    fill_metadata(workspace, args, &mut input).await?;
    save_with_retry(workspace, &mut input).await
}

fn summary_line(record: &RecordingRecord) -> String {
    let tags = if record.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", record.tags.join(", "))
    };
    format!(
        "{:>6}  {}  {:>5}  {} by {}{}",
        record.id,
        record.created_at.format("%Y-%m-%d"),
        record.duration.as_deref().unwrap_or("-"),
        record.title,
        record.creator,
        tags
    )
}

fn details(record: &RecordingRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title:       {}\n", record.title));
    out.push_str(&format!("Id:          {}\n", record.id));
    out.push_str(&format!("Creator:     {}\n", record.creator));
    out.push_str(&format!("Created:     {}\n", record.created_at.to_rfc3339()));
    if let Some(ref duration) = record.duration {
        out.push_str(&format!("Duration:    {}\n", duration));
    }
    if let Some(size) = record.file_size {
        out.push_str(&format!("Size:        {} bytes\n", size));
    }
    if !record.tags.is_empty() {
        out.push_str(&format!("Tags:        {}\n", record.tags.join(", ")));
    }
    if let Some(ref description) = record.description {
        out.push_str(&format!("Description: {}\n", description));
    }
    out
}
