//! Access engine configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [cache]
//! enabled = true
//!
//! [diagnostics]
//! enabled = false
//! trace_capacity = 1024
//!
//! [policy]
//! files = ["policy/roles.toml", "policy/rules.toml"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::composite::DEFAULT_TRACE_CAPACITY;

/// Root access engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Role lookup caching.
    pub cache: CacheConfig,

    /// Lookup tracing.
    pub diagnostics: DiagnosticsConfig,

    /// Policy sources.
    pub policy: PolicyConfig,
}

/// Role lookup caching.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memoize user and veto role lookups.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Lookup tracing.
///
/// When enabled the engine resolves through an uncached diagnostic resolver,
/// whatever `cache.enabled` says.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,

    /// Number of trace entries retained.
    pub trace_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trace_capacity: DEFAULT_TRACE_CAPACITY,
        }
    }
}

/// Policy sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy documents, loaded in order as one policy.
    pub files: Vec<PathBuf>,
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration source could not be read or parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl AccessConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if diagnostics are enabled with a
    /// zero trace capacity or a policy file path is empty, and
    /// `ConfigError::Missing` if a policy file does not exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.diagnostics.enabled && self.diagnostics.trace_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "diagnostics trace_capacity must be > 0".to_string(),
            ));
        }

        for file in &self.policy.files {
            if file.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "policy file path cannot be empty".to_string(),
                ));
            }
            if !file.exists() {
                return Err(ConfigError::Missing(format!(
                    "policy file {}",
                    file.display()
                )));
            }
        }

        Ok(())
    }
}
