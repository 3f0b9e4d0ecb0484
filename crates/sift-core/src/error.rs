//! Error types and result aliases for Sift.
//!
//! This module defines the shared error types used across all Sift components.
//! Errors are structured for programmatic handling and include context for debugging.

/// The result type used throughout Sift.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Sift storage and path operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The referenced object is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The destination object already exists and will not be overwritten.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A retryable network or storage fault.
    #[error("transient storage error: {message}")]
    Transient {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new transient storage error with the given message.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transient storage error with a source cause.
    #[must_use]
    pub fn transient_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the error indicates the referenced object is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
