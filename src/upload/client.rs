//! Recordings service client
//!
//! `StorageClient` is the seam between the upload coordinator and the remote
//! recordings service. `HttpStorageClient` speaks the service's REST API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::metadata::RecordingMetadata;
use crate::catalog::{RecordingId, RecordingQuery, RecordingRecord};
use crate::recorder::{Artifact, ARTIFACT_EXTENSION};

/// Default service base when none is configured
pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

/// Multipart field carrying the media
pub const VIDEO_FIELD: &str = "video";

/// Errors reported by the recordings service or the transport
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Recording not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Service responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("Media unavailable for recording {0}")]
    MediaUnavailable(String),
}

/// Recordings service operations
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List recordings, newest first
    async fn list(&self, query: &RecordingQuery) -> Result<Vec<RecordingRecord>, ClientError>;

    async fn get(&self, id: &RecordingId) -> Result<RecordingRecord, ClientError>;

    /// Upload an artifact with its metadata; returns the stored record
    async fn create(
        &self,
        artifact: &Artifact,
        metadata: &RecordingMetadata,
    ) -> Result<RecordingRecord, ClientError>;

    async fn delete(&self, id: &RecordingId) -> Result<(), ClientError>;

    /// Fetch the media bytes behind a record's locator
    async fn fetch_media(&self, record: &RecordingRecord) -> Result<Bytes, ClientError>;
}

/// Service health report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// REST client for the recordings service
#[derive(Debug, Clone)]
pub struct HttpStorageClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpStorageClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let trimmed = base_url.trim_end_matches('/');
        // Trailing slash so relative joins keep the `/api` segment
        let base = Url::parse(&format!("{}/", trimmed))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Check the service is up
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self.http.get(self.endpoint("health")?).send().await?;
        read_json(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn recording_url(&self, id: &RecordingId) -> Result<Url, ClientError> {
        self.endpoint(&format!("recordings/{}", urlencoding::encode(id.as_str())))
    }

    /// Absolute locators are used as-is; others resolve against the service base
    fn media_url(&self, locator: &str) -> Result<Url, ClientError> {
        match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(_) => self.endpoint(locator.trim_start_matches('/')),
        }
    }
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn list(&self, query: &RecordingQuery) -> Result<Vec<RecordingRecord>, ClientError> {
        let response = self
            .http
            .get(self.endpoint("recordings")?)
            .query(&query.to_pairs())
            .send()
            .await?;
        let records: Vec<RecordingRecord> = read_json(response).await?;
        debug!("Listed {} recordings", records.len());
        Ok(records)
    }

    async fn get(&self, id: &RecordingId) -> Result<RecordingRecord, ClientError> {
        let response = self.http.get(self.recording_url(id)?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(id.to_string()));
        }
        read_json(response).await
    }

    async fn create(
        &self,
        artifact: &Artifact,
        metadata: &RecordingMetadata,
    ) -> Result<RecordingRecord, ClientError> {
        let video = Part::stream_with_length(Body::from(artifact.data().clone()), artifact.size() as u64)
            .file_name(format!("recording.{}", ARTIFACT_EXTENSION))
            .mime_str(artifact.mime_type())?;

        let form = Form::new()
            .part(VIDEO_FIELD, video)
            .text("title", metadata.title.clone())
            .text("description", metadata.description.clone().unwrap_or_default())
            .text("tags", metadata.tags_text())
            .text("creator", metadata.creator.clone())
            .text("duration", metadata.duration.clone());

        info!(
            "Uploading {} bytes for \"{}\" ({})",
            artifact.size(),
            metadata.title,
            metadata.duration
        );

        let response = self
            .http
            .post(self.endpoint("recordings")?)
            .multipart(form)
            .send()
            .await?;
        let record: RecordingRecord = read_json(response).await?;

        info!("Upload stored as recording {}", record.id);
        Ok(record)
    }

    async fn delete(&self, id: &RecordingId) -> Result<(), ClientError> {
        let response = self.http.delete(self.recording_url(id)?).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(id.to_string())),
            status if status.is_success() => {
                info!("Deleted recording {}", id);
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn fetch_media(&self, record: &RecordingRecord) -> Result<Bytes, ClientError> {
        let locator = record
            .media_locator
            .as_deref()
            .ok_or_else(|| ClientError::MediaUnavailable(record.id.to_string()))?;
        let url = self.media_url(locator)?;
        debug!("Fetching media for {} from {}", record.id, url);

        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::MediaUnavailable(record.id.to_string())),
            status if status.is_success() => Ok(response.bytes().await?),
            _ => Err(status_error(response).await),
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Malformed(e.to_string()))
}

/// Build a status error, preferring the service's `{"error": ...}` message
async fn status_error(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpStorageClient {
        HttpStorageClient::new("http://localhost:3001/api/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let client = client();
        assert_eq!(
            client.endpoint("recordings").unwrap().as_str(),
            "http://localhost:3001/api/recordings"
        );
        assert_eq!(
            client.recording_url(&RecordingId::new("a b/c")).unwrap().as_str(),
            "http://localhost:3001/api/recordings/a%20b%2Fc"
        );
    }

    #[test]
    fn test_media_url_resolution() {
        let client = client();
        assert_eq!(
            client.media_url("https://cdn.example/v.webm").unwrap().as_str(),
            "https://cdn.example/v.webm"
        );
        assert_eq!(
            client.media_url("/uploads/temp-recording-1.webm").unwrap().as_str(),
            "http://localhost:3001/api/uploads/temp-recording-1.webm"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpStorageClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_error_message_prefers_service_body() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"No video file provided"}"#),
            "No video file provided"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "  "), "Bad Gateway");
        assert_eq!(error_message(StatusCode::INTERNAL_SERVER_ERROR, "boom"), "boom");
    }
}
