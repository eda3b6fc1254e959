//! Error handling module for the migration engine
//!
//! Provides the error type shared by the value model, the registry and the
//! engine. Absent sources are never errors; they surface as skipped steps.

use thiserror::Error;

use crate::value::ValueKind;

/// Main error type for configuration migration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    /// A value exists but has the wrong shape for the step to process
    #[error("Structural error at {location}: expected {expected}, found {found}")]
    Structural {
        location: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Target (or current) version outside the registered range
    #[error("Unknown schema version {version} (supported range is {lowest}..={highest})")]
    UnknownVersion { version: u32, lowest: u32, highest: u32 },

    /// Dotted key path that cannot be parsed
    #[error("Invalid key path '{path}'")]
    InvalidPath { path: String },

    /// Step registered under a version that cannot introduce steps
    #[error("Cannot register step at version {version}: {reason}")]
    InvalidRegistration { version: u32, reason: String },

    /// Deadline elapsed before the next step could start
    #[error("Migration deadline exceeded before step '{step}' (version {version})")]
    DeadlineExceeded { version: u32, step: String },

    /// A step failed; the underlying error is kept as the source
    #[error("Migration step '{step}' (version {version}) failed")]
    StepFailed {
        version: u32,
        step: String,
        #[source]
        source: Box<MigrationError>,
    },
}

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    /// Create a structural error for a location
    pub fn structural(location: impl Into<String>, expected: ValueKind, found: ValueKind) -> Self {
        Self::Structural {
            location: location.into(),
            expected,
            found,
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// True for structural errors, including ones wrapped by a failed step
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Structural { .. } => true,
            Self::StepFailed { source, .. } => source.is_structural(),
            _ => false,
        }
    }

    /// True for unknown version errors
    pub fn is_unknown_version(&self) -> bool {
        matches!(self, Self::UnknownVersion { .. })
    }

    /// The innermost error, looking through failed-step wrappers
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            Self::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
