//! User-supplied recording metadata
//!
//! Validated at the upload boundary before any network interaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted description, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Creator used when the user does not provide one
pub const DEFAULT_CREATOR: &str = "Current User";

/// Metadata rejected before upload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    MissingTitle,

    #[error("Description is {len} characters, the limit is {max}")]
    DescriptionTooLong { len: usize, max: usize },
}

/// Metadata attached to a recording at upload time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub title: String,
    pub description: Option<String>,
    /// Ordered, de-duplicated, trimmed
    pub tags: Vec<String>,
    pub creator: String,
    /// Recorded time as `m:ss`
    pub duration: String,
}

impl RecordingMetadata {
    /// Empty draft for a recording of the given duration
    pub fn draft(creator: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            description: None,
            tags: Vec::new(),
            creator: creator.into(),
            duration: duration.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description; blank text clears it
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }

    /// Set tags from comma-separated text
    pub fn with_tags_text(mut self, text: &str) -> Self {
        self.tags = parse_tags(text);
        self
    }

    /// Tags in the comma-separated form the service expects
    pub fn tags_text(&self) -> String {
        self.tags.join(",")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if let Some(ref description) = self.description {
            let len = description.chars().count();
            if len > MAX_DESCRIPTION_CHARS {
                return Err(ValidationError::DescriptionTooLong {
                    len,
                    max: MAX_DESCRIPTION_CHARS,
                });
            }
        }
        Ok(())
    }
}

/// Split comma-separated tags, trimming and dropping empties and repeats
pub fn parse_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
