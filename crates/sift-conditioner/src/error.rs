//! Error types for conditioning operations.

use thiserror::Error;

/// Result type alias for conditioning operations.
pub type Result<T> = std::result::Result<T, ConditionError>;

/// Errors that can occur while conditioning a file.
///
/// Storage faults keep their own taxonomy from `sift-core` (not found,
/// already exists, transient); everything here is specific to the content of
/// the file being conditioned or to the run's resource bounds.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// A storage gateway operation failed.
    #[error(transparent)]
    Storage(#[from] sift_core::Error),

    /// The payload is not a well-formed columnar file.
    #[error("format error: {message}")]
    Format {
        /// Description of the structural problem.
        message: String,
    },

    /// Schema or column-shape invariant violated.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the inconsistency.
        message: String,
    },

    /// The raw file exceeds the staging capacity configured for a run.
    #[error("staging capacity exceeded: {size} bytes, limit {limit}")]
    ResourceExhausted {
        /// Size of the raw file in bytes.
        size: u64,
        /// Configured staging limit in bytes.
        limit: u64,
    },
}

impl ConditionError {
    /// Creates a format error with the given message.
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates a schema mismatch error with the given message.
    #[must_use]
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Returns true if the error is the publish-side conflict raised when the
    /// conditioned object already exists (duplicate trigger delivery).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(sift_core::Error::AlreadyExists(_)))
    }
}
