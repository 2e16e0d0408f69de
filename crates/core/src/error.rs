//! Error types for arbor
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! "Not found" is deliberately absent: a read of a missing path is a normal
//! `Ok(None)`, never an error.

use crate::limits::LimitError;
use crate::path::NodePath;
use thiserror::Error;

/// Result type alias for arbor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for arbor
#[derive(Debug, Error)]
pub enum Error {
    /// A write would attach children to a scalar, or give a container a
    /// shape incompatible with what is stored
    #[error("Type conflict at {path}: {reason}")]
    TypeConflict {
        /// Path where the conflict was detected
        path: NodePath,
        /// What was attempted
        reason: String,
    },

    /// An array element identifier is unusable or collides with another slot
    #[error("Malformed identifier '{segment}' under {path}")]
    MalformedIdentifier {
        /// Path of the array
        path: NodePath,
        /// The offending segment
        segment: String,
    },

    /// Failure reported by the record backend, passed through verbatim
    #[error("Backend error: {0}")]
    Backend(String),

    /// Path cannot be used for the requested operation
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Written value or path exceeds a configured limit
    #[error("Limit exceeded: {0}")]
    Limit(#[from] LimitError),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a type conflict error
    pub fn type_conflict(path: &NodePath, reason: impl Into<String>) -> Self {
        Error::TypeConflict {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Build a malformed identifier error
    pub fn malformed_identifier(path: &NodePath, segment: impl Into<String>) -> Self {
        Error::MalformedIdentifier {
            path: path.clone(),
            segment: segment.into(),
        }
    }

    /// Wrap a backend failure
    pub fn backend(e: impl std::fmt::Display) -> Self {
        Error::Backend(e.to_string())
    }

    /// True for [`Error::TypeConflict`]
    pub fn is_type_conflict(&self) -> bool {
        matches!(self, Error::TypeConflict { .. })
    }

    /// True for consistency failures of stored data and backend failures
    ///
    /// `MalformedIdentifier` is reported in the same class as backend errors.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::MalformedIdentifier { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
