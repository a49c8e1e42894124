//! Upload coordinator
//!
//! Validates metadata and size, then hands the artifact to the storage
//! client. Cancellable mid-transfer through a `CancellationToken`.

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::client::{ClientError, StorageClient};
use super::metadata::{RecordingMetadata, ValidationError};
use crate::catalog::RecordingRecord;
use crate::recorder::Artifact;

/// Largest artifact the service accepts (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Upload failures
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid metadata: {0}")]
    Validation(#[from] ValidationError),

    #[error("Recording is {size} bytes, the upload limit is {limit}")]
    Oversize { size: u64, limit: u64 },

    #[error("Upload failed: {0}")]
    Collaborator(#[from] ClientError),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("No recording is waiting to be saved")]
    NoDraft,
}

impl UploadError {
    /// Whether the same draft can be submitted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::Collaborator(ClientError::Network(_))
                | UploadError::Collaborator(ClientError::Status { .. })
                | UploadError::Cancelled
        )
    }
}

/// Submits finalized artifacts to the recordings service
#[derive(Clone)]
pub struct UploadCoordinator {
    client: Arc<dyn StorageClient>,
    max_upload_bytes: u64,
}

impl UploadCoordinator {
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self {
            client,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Validate and upload; nothing leaves the process unless validation passes
    pub async fn submit(
        &self,
        artifact: &Artifact,
        metadata: &RecordingMetadata,
        cancel: &CancellationToken,
    ) -> Result<RecordingRecord, UploadError> {
        metadata.validate()?;

        let size = artifact.size() as u64;
        if size > self.max_upload_bytes {
            return Err(UploadError::Oversize {
                size,
                limit: self.max_upload_bytes,
            });
        }

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Upload of session {} cancelled", artifact.session_id());
                Err(UploadError::Cancelled)
            }
            result = self.client.create(artifact, metadata) => {
                let record = result?;
                info!("Session {} saved as recording {}", artifact.session_id(), record.id);
                Ok(record)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{RecordingId, RecordingQuery};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// In-memory service that counts create calls
    pub(crate) struct CountingClient {
        pub creates: Mutex<u32>,
        pub deletes: Mutex<Vec<String>>,
        pub fail_with: Mutex<Option<u16>>,
        pub delay: Option<Duration>,
        pub listed: Mutex<Vec<RecordingRecord>>,
    }

    impl CountingClient {
        pub(crate) fn new() -> Self {
            Self {
                creates: Mutex::new(0),
                deletes: Mutex::new(Vec::new()),
                fail_with: Mutex::new(None),
                delay: None,
                listed: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn create_calls(&self) -> u32 {
            *self.creates.lock()
        }
    }

    pub(crate) fn record(id: &str, title: &str) -> RecordingRecord {
        RecordingRecord {
            id: RecordingId::new(id),
            title: title.to_string(),
            description: None,
            tags: Vec::new(),
            creator: "Current User".to_string(),
            duration: Some("0:03".to_string()),
            file_size: Some(3),
            mime_type: Some("video/webm".to_string()),
            created_at: Utc::now(),
            media_locator: None,
        }
    }

    #[async_trait]
    impl StorageClient for CountingClient {
        async fn list(&self, _query: &RecordingQuery) -> Result<Vec<RecordingRecord>, ClientError> {
            Ok(self.listed.lock().clone())
        }

        async fn get(&self, id: &RecordingId) -> Result<RecordingRecord, ClientError> {
            Err(ClientError::NotFound(id.to_string()))
        }

        async fn create(
            &self,
            _artifact: &Artifact,
            metadata: &RecordingMetadata,
        ) -> Result<RecordingRecord, ClientError> {
            let call = {
                let mut creates = self.creates.lock();
                *creates += 1;
                *creates
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(status) = *self.fail_with.lock() {
                return Err(ClientError::Status {
                    status,
                    message: "Failed to upload recording".to_string(),
                });
            }
            Ok(record(&call.to_string(), &metadata.title))
        }

        async fn delete(&self, id: &RecordingId) -> Result<(), ClientError> {
            self.deletes.lock().push(id.to_string());
            Ok(())
        }

        async fn fetch_media(&self, record: &RecordingRecord) -> Result<Bytes, ClientError> {
            Err(ClientError::MediaUnavailable(record.id.to_string()))
        }
    }

    pub(crate) fn artifact(len: usize) -> Artifact {
        Artifact::from_bytes(Bytes::from(vec![7u8; len]), 3).unwrap()
    }

    fn metadata(title: &str) -> RecordingMetadata {
        RecordingMetadata::draft("Current User", "0:03").with_title(title)
    }

    #[tokio::test]
    async fn test_blank_title_never_reaches_service() {
        let client = Arc::new(CountingClient::new());
        let uploader = UploadCoordinator::new(client.clone());

        let result = uploader
            .submit(&artifact(3), &metadata(""), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(UploadError::Validation(ValidationError::MissingTitle))));
        assert_eq!(client.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversize_never_reaches_service() {
        let client = Arc::new(CountingClient::new());
        let uploader = UploadCoordinator::new(client.clone()).with_max_upload_bytes(2);

        let result = uploader
            .submit(&artifact(3), &metadata("Demo"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(UploadError::Oversize { size: 3, limit: 2 })));
        assert_eq!(client.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_submit_returns_record() {
        let client = Arc::new(CountingClient::new());
        let uploader = UploadCoordinator::new(client.clone());

        let record = uploader
            .submit(&artifact(3), &metadata("Demo"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(record.title, "Demo");
        assert_eq!(client.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_service_failure_is_collaborator_error() {
        let client = Arc::new(CountingClient::new());
        *client.fail_with.lock() = Some(500);
        let uploader = UploadCoordinator::new(client.clone());

        let err = uploader
            .submit(&artifact(3), &metadata("Demo"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Collaborator(ClientError::Status { status: 500, .. })));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_transfer() {
        let mut client = CountingClient::new();
        client.delay = Some(Duration::from_secs(30));
        let client = Arc::new(client);
        let uploader = UploadCoordinator::new(client.clone());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = uploader.submit(&artifact(3), &metadata("Demo"), &cancel).await;

        assert!(matches!(result, Err(UploadError::Cancelled)));
        assert_eq!(client.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_service() {
        let client = Arc::new(CountingClient::new());
        let uploader = UploadCoordinator::new(client.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = uploader.submit(&artifact(3), &metadata("Demo"), &cancel).await;

        assert!(matches!(result, Err(UploadError::Cancelled)));
        assert_eq!(client.create_calls(), 0);
    }
}
