//! Policy loading error types.

use std::path::PathBuf;

/// Errors that can occur while loading a policy document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The policy file could not be read.
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or JSON, or has the wrong shape.
    #[error("Failed to parse {format} policy document: {message}")]
    Parse {
        /// Document format that was being parsed.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// The file extension does not name a supported format.
    #[error("Unsupported policy format: {extension}")]
    UnsupportedFormat {
        /// The extension found on the file, if any.
        extension: String,
    },

    /// A rule or mapping references an undeclared role or an unknown type.
    #[error("Invalid reference in {location}: {message}")]
    InvalidReference {
        /// The rule (`category.action`) or mapping the reference was found in.
        location: String,
        /// What could not be resolved.
        message: String,
    },
}

impl LoadError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(format: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidReference` error.
    #[must_use]
    pub fn invalid_reference(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the document was readable but its content is inconsistent.
    #[must_use]
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Self::InvalidReference { .. })
    }
}

impl From<toml::de::Error> for LoadError {
    fn from(err: toml::de::Error) -> Self {
        Self::parse("TOML", err.message())
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse("JSON", err.to_string())
    }
}

impl From<LoadError> for rolegate_core::AccessError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::InvalidReference { location, message } => {
                Self::invalid_reference(location, message)
            }
            other => Self::configuration(other.to_string()),
        }
    }
}

/// Result type for policy loading operations.
pub type LoadResult<T> = Result<T, LoadError>;
