//! Recording record schema
//!
//! These types match the JSON rows returned by the recordings service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Server-assigned recording identifier
///
/// The service may send it as a number or a string; it is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordingId(String);

impl RecordingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for RecordingId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Uint(u64),
    Str(String),
}

impl NumberOrString {
    fn into_string(self) -> String {
        match self {
            NumberOrString::Int(n) => n.to_string(),
            NumberOrString::Uint(n) => n.to_string(),
            NumberOrString::Str(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for RecordingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(NumberOrString::deserialize(deserializer)?.into_string()))
    }
}

/// Sizes may arrive as strings when the database column is a BIGINT
fn size_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Uint(n)) => Ok(Some(n)),
        Some(NumberOrString::Int(n)) => u64::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("negative file size {}", n))),
        Some(NumberOrString::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid file size {:?}", s))),
    }
}

// =============================================================================
// Records
// =============================================================================

/// A server-confirmed recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct RecordingRecord {
    pub id: RecordingId,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub creator: String,
    /// Duration label as entered at upload time (`m:ss`)
    pub duration: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Opaque reference used to download the media
    pub media_locator: Option<String>,
}

impl RecordingRecord {
    /// Whether the record carries `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// File name used when downloading the media
    pub fn download_file_name(&self, extension: &str) -> String {
        let stem: String = self
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}.{}", stem, extension)
    }
}

/// Wire shape; the locator goes by several names depending on the service version
#[derive(Deserialize)]
struct RawRecord {
    id: RecordingId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default, deserialize_with = "size_from_number_or_string")]
    file_size: Option<u64>,
    #[serde(default)]
    mime_type: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    media_locator: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    s3_key: Option<String>,
}

impl From<RawRecord> for RecordingRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            description: raw.description,
            tags: raw.tags.unwrap_or_default(),
            creator: raw.creator.unwrap_or_else(|| "Anonymous".to_string()),
            duration: raw.duration,
            file_size: raw.file_size,
            mime_type: raw.mime_type,
            created_at: raw.created_at,
            media_locator: raw.media_locator.or(raw.video_url).or(raw.s3_key),
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Server-side list filter; empty fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub creator: Option<String>,
}

impl RecordingQuery {
    /// Query-string pairs for the non-empty filters
    pub fn to_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("search", self.search.as_deref()),
            ("tag", self.tag.as_deref()),
            ("creator", self.creator.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some((key, v)),
            _ => None,
        })
        .collect()
    }
}
