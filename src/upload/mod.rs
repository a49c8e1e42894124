//! Upload module
//!
//! Metadata validation, the recordings service client, the upload
//! coordinator, and the workspace holding the catalog and pending draft.

pub mod client;
pub mod coordinator;
pub mod metadata;
pub mod workspace;

pub use client::{ClientError, HealthStatus, HttpStorageClient, StorageClient, DEFAULT_API_URL};
pub use coordinator::{UploadCoordinator, UploadError, DEFAULT_MAX_UPLOAD_BYTES};
pub use metadata::{parse_tags, RecordingMetadata, ValidationError, DEFAULT_CREATOR, MAX_DESCRIPTION_CHARS};
pub use workspace::{Draft, Workspace};
