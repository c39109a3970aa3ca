//! Suite configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storageops_core::{tag_set, TagSet};
use thiserror::Error;

/// Default wait between detach and delete during teardown.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3000;

/// Labels applied during the tag stage.
///
/// One value contains non-alphanumeric separators and one key/value pair is
/// mixed case, to catch drivers that normalize tag storage.
pub fn default_labels() -> TagSet {
    tag_set([
        ("source", "openstorage-test"),
        ("foo", "bar"),
        ("Test", "UPPER_CASE"),
    ])
}

/// Errors loading suite configuration or fixture catalogs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("toml error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// YAML parsing error.
    #[error("yaml error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// File extension is neither TOML nor YAML.
    #[error("unsupported config format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Parsed but semantically invalid.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Toml,
    Yaml,
}

impl Format {
    /// Detect the format from a file extension.
    pub(crate) fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Format::Toml),
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Read and deserialize a TOML or YAML file.
pub(crate) fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format =
        Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path)?;
    log::debug!("Parsing {:?} file {}", format, path.display());

    match format {
        Format::Toml => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        }),
        Format::Yaml => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Settings shared by every (driver, fixture) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Milliseconds to wait between detach and delete, for backends whose
    /// detach completes asynchronously.
    pub settle_delay_ms: u64,

    /// Labels used by the tag and enumerate stages.
    pub labels: TagSet,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            labels: default_labels(),
        }
    }
}

impl SuiteConfig {
    /// Load configuration from a TOML or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config: SuiteConfig = load_file(path)?;
        config.validate()?;
        log::info!("Loaded suite config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Replace the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Replace the tag stage labels.
    pub fn with_labels(mut self, labels: TagSet) -> Self {
        self.labels = labels;
        self
    }

    /// Wait between detach and delete.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check the label set is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.labels.is_empty() {
            return Err(ConfigError::Invalid("labels must not be empty".to_string()));
        }
        if let Some((key, _)) = self.labels.iter().find(|(k, v)| k.is_empty() || v.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "label keys and values must not be empty (key: {:?})",
                key
            )));
        }
        Ok(())
    }
}
