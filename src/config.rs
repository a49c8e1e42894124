//! Application configuration
//!
//! Defaults, then an optional TOML file, then environment overrides.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::capture::CaptureSettings;
use crate::recorder::RecorderLimits;
use crate::upload::{DEFAULT_API_URL, DEFAULT_CREATOR, DEFAULT_MAX_UPLOAD_BYTES};

pub const API_URL_ENV: &str = "HARVEST_API_URL";
pub const CREATOR_ENV: &str = "HARVEST_CREATOR";
pub const MAX_DURATION_ENV: &str = "HARVEST_MAX_DURATION_SECS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct HarvestConfig {
    /// Recordings service base URL
    pub api_url: String,

    /// Creator recorded on uploads
    pub creator: String,

    pub max_upload_bytes: u64,

    pub request_timeout_secs: u64,

    pub limits: RecorderLimits,

    pub capture: CaptureSettings,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            creator: DEFAULT_CREATOR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout_secs: 300,
            limits: RecorderLimits::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl HarvestConfig {
    /// Load from `path` (if any) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(creator) = lookup(CREATOR_ENV).filter(|v| !v.trim().is_empty()) {
            self.creator = creator;
        }
        if let Some(secs) = lookup(MAX_DURATION_ENV) {
            let max: u64 = secs.trim().parse().map_err(|_| ConfigError::Invalid {
                key: MAX_DURATION_ENV,
                message: format!("{:?} is not a number of seconds", secs),
            })?;
            // The warning keeps its lead time before the new ceiling
            let lead = self
                .limits
                .max_duration_secs
                .saturating_sub(self.limits.warning_at_secs);
            self.limits.max_duration_secs = max;
            self.limits.warning_at_secs = max.saturating_sub(lead);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_duration_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "limits.max_duration_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.limits.warning_at_secs >= self.limits.max_duration_secs {
            return Err(ConfigError::Invalid {
                key: "limits.warning_at_secs",
                message: format!(
                    "{} must be below the {}s ceiling",
                    self.limits.warning_at_secs, self.limits.max_duration_secs
                ),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "max_upload_bytes",
                message: "must be greater than zero".to_string(),
            });
        }
        Url::parse(&self.api_url).map_err(|e| ConfigError::Invalid {
            key: "api_url",
            message: format!("{}: {}", self.api_url, e),
        })?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarvestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_duration_secs, 900);
        assert_eq!(config.limits.warning_at_secs, 780);
        assert_eq!(config.api_url, "http://localhost:3001/api");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        std::fs::write(
            &path,
            "creator = \"Alice\"\n\n[limits]\nmax_duration_secs = 600\nwarning_at_secs = 540\n\n[capture]\nframerate = 15\n",
        )
        .unwrap();

        let config = HarvestConfig::from_file(&path).unwrap();

        assert_eq!(config.creator, "Alice");
        assert_eq!(config.limits.max_duration_secs, 600);
        assert_eq!(config.capture.framerate, 15);
        assert_eq!(config.capture.ffmpeg_path, "ffmpeg");
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "limits = 3").unwrap();

        let err = HarvestConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (API_URL_ENV, "https://library.example/api"),
            (CREATOR_ENV, "Bob"),
            (MAX_DURATION_ENV, "1200"),
        ]
        .into_iter()
        .collect();

        let mut config = HarvestConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_url, "https://library.example/api");
        assert_eq!(config.creator, "Bob");
        assert_eq!(config.limits.max_duration_secs, 1200);
        assert_eq!(config.limits.warning_at_secs, 1080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lower_ceiling_override_moves_warning() {
        let mut config = HarvestConfig::default();
        config
            .apply_overrides(|key| (key == MAX_DURATION_ENV).then(|| "600".to_string()))
            .unwrap();

        assert_eq!(config.limits.max_duration_secs, 600);
        assert_eq!(config.limits.warning_at_secs, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ceiling_override_keeps_configured_lead() {
        let mut config = HarvestConfig::default();
        config.limits.max_duration_secs = 600;
        config.limits.warning_at_secs = 570;
        config
            .apply_overrides(|key| (key == MAX_DURATION_ENV).then(|| "60".to_string()))
            .unwrap();

        assert_eq!(config.limits.warning_at_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_numeric_duration_override() {
        let mut config = HarvestConfig::default();
        let err = config
            .apply_overrides(|key| (key == MAX_DURATION_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MAX_DURATION_ENV, .. }));
    }

    #[test]
    fn test_warning_must_precede_ceiling() {
        let mut config = HarvestConfig::default();
        config.limits.max_duration_secs = 700;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "limits.warning_at_secs", .. })
        ));

        config.limits.max_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_api_url() {
        let config = HarvestConfig {
            api_url: "localhost without scheme".to_string(),
            ..HarvestConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { key: "api_url", .. })));
    }
}
