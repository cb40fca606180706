//! Access-control error types.
//!
//! This module defines the errors that can occur while building a policy
//! store or evaluating an access check.

use std::fmt;

/// Errors that can occur while building policy indexes or deciding access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Two rules or two mappings in one snapshot share the same key.
    #[error("Duplicate {kind} key: {key}")]
    DuplicateKey {
        /// What kind of entry was duplicated (`rule` or `mapping`).
        kind: &'static str,
        /// Display form of the duplicated key.
        key: String,
    },

    /// A policy entry references an unknown role or type.
    #[error("Invalid reference in {location}: {message}")]
    InvalidReference {
        /// Where the reference was found.
        location: String,
        /// What could not be resolved.
        message: String,
    },

    /// An access check supplied more context objects than supported.
    #[error("Too many context objects: {actual} (maximum {max})")]
    CardinalityExceeded {
        /// Largest supported number of contexts.
        max: usize,
        /// Number of contexts supplied.
        actual: usize,
    },

    /// A context object has no resolvable persistent identity.
    #[error("Unresolved identity: {message}")]
    UnresolvedIdentity {
        /// Description of the object that could not be identified.
        message: String,
    },

    /// A role name is empty or not declared by the policy.
    #[error("Invalid role: {role}")]
    InvalidRole {
        /// The offending role name.
        role: String,
    },

    /// The engine was assembled from invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl AccessError {
    /// Creates a new `DuplicateKey` error for a rule key.
    #[must_use]
    pub fn duplicate_rule(key: impl fmt::Display) -> Self {
        Self::DuplicateKey {
            kind: "rule",
            key: key.to_string(),
        }
    }

    /// Creates a new `DuplicateKey` error for a mapping key.
    #[must_use]
    pub fn duplicate_mapping(key: impl fmt::Display) -> Self {
        Self::DuplicateKey {
            kind: "mapping",
            key: key.to_string(),
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

    /// Creates a new `CardinalityExceeded` error.
    #[must_use]
    pub fn cardinality_exceeded(max: usize, actual: usize) -> Self {
        Self::CardinalityExceeded { max, actual }
    }

    /// Creates a new `UnresolvedIdentity` error.
    #[must_use]
    pub fn unresolved_identity(message: impl Into<String>) -> Self {
        Self::UnresolvedIdentity {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRole` error.
    #[must_use]
    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole { role: role.into() }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the error was caused by the policy content.
    #[must_use]
    pub fn is_policy_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKey { .. } | Self::InvalidReference { .. }
        )
    }

    /// Returns `true` if the error was caused by the arguments of an access check.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::CardinalityExceeded { .. }
                | Self::UnresolvedIdentity { .. }
                | Self::InvalidRole { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateKey { .. } => ErrorCategory::Policy,
            Self::InvalidReference { .. } => ErrorCategory::Policy,
            Self::CardinalityExceeded { .. } => ErrorCategory::Request,
            Self::UnresolvedIdentity { .. } => ErrorCategory::Request,
            Self::InvalidRole { .. } => ErrorCategory::Request,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of access-control errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The policy content is inconsistent.
    Policy,
    /// The access check arguments are unusable.
    Request,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy => write!(f, "policy"),
            Self::Request => write!(f, "request"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Result type for access-control operations.
pub type AccessResult<T> = Result<T, AccessError>;
