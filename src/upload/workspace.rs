//! Library workspace
//!
//! Owns the client-side catalog and the draft awaiting upload. A failed or
//! cancelled save keeps the draft so the user can retry without recording
//! again.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::ClientError;
use super::coordinator::{UploadCoordinator, UploadError};
use super::metadata::RecordingMetadata;
use crate::catalog::{Catalog, RecordingId, RecordingQuery, RecordingRecord};
use crate::recorder::Artifact;

/// A finalized recording with the metadata being edited for it
#[derive(Debug, Clone)]
pub struct Draft {
    pub artifact: Artifact,
    pub metadata: RecordingMetadata,
}

pub struct Workspace {
    uploader: UploadCoordinator,
    catalog: Catalog,
    draft: Option<Draft>,
}

impl Workspace {
    pub fn new(uploader: UploadCoordinator) -> Self {
        Self {
            uploader,
            catalog: Catalog::new(),
            draft: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn uploader(&self) -> &UploadCoordinator {
        &self.uploader
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        self.draft.as_mut()
    }

    /// Hold a finalized artifact for metadata entry; replaces any earlier draft
    pub fn stage(&mut self, artifact: Artifact, creator: &str) -> &mut Draft {
        if let Some(previous) = self.draft.take() {
            warn!("Replacing unsaved draft from session {}", previous.artifact.session_id());
        }
        let metadata = RecordingMetadata::draft(creator, artifact.duration_label());
        self.draft.insert(Draft { artifact, metadata })
    }

    /// Drop the draft without uploading
    pub fn discard_draft(&mut self) -> Option<Draft> {
        let draft = self.draft.take();
        if let Some(ref d) = draft {
            info!("Discarded draft from session {}", d.artifact.session_id());
        }
        draft
    }

    /// Upload the draft; on success the record joins the catalog and the draft is cleared
    pub async fn save_draft(&mut self, cancel: &CancellationToken) -> Result<RecordingRecord, UploadError> {
        let draft = self.draft.as_ref().ok_or(UploadError::NoDraft)?;
        let record = self
            .uploader
            .submit(&draft.artifact, &draft.metadata, cancel)
            .await?;

        self.catalog.prepend(record.clone());
        self.draft = None;
        Ok(record)
    }

    /// Reload the catalog from the service
    pub async fn refresh(&mut self, query: &RecordingQuery) -> Result<usize, ClientError> {
        let records = self.uploader.client().list(query).await?;
        let count = records.len();
        self.catalog.replace(records);
        Ok(count)
    }

    pub async fn get(&self, id: &RecordingId) -> Result<RecordingRecord, ClientError> {
        if let Some(record) = self.catalog.get(id) {
            return Ok(record.clone());
        }
        self.uploader.client().get(id).await
    }

    /// Delete on the service and locally
    ///
    /// A record the service no longer knows is still dropped from the
    /// catalog, and the not-found error is returned.
    pub async fn delete(&mut self, id: &RecordingId) -> Result<(), ClientError> {
        match self.uploader.client().delete(id).await {
            Ok(()) => {
                self.catalog.remove(id);
                Ok(())
            }
            Err(ClientError::NotFound(missing)) => {
                debug!("Recording {} already gone on the service", missing);
                self.catalog.remove(id);
                Err(ClientError::NotFound(missing))
            }
            Err(e) => Err(e),
        }
    }
}
