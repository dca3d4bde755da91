//! Error taxonomy for the registry core
//!
//! Every failure the core can report has its own variant so that outer layers
//! (CLI, an HTTP front end) can tell them apart without string matching.
//! Application code wraps these in `anyhow` like the rest of the CLI does.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `names[0].en.full`)
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Core error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("malformed identifier `{value}`: {reason}")]
    MalformedIdentifier { value: String, reason: String },

    #[error("slug already taken: {id}")]
    SlugCollision { id: String },

    #[error("{field} references missing record {id}")]
    DanglingReference { field: String, id: String },

    #[error("not found: {id}")]
    NotFound { id: String },

    #[error("migration {name} failed: {cause}")]
    MigrationFailed { name: String, cause: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot (de)serialize {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error kinds, one per variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    MalformedIdentifier,
    SlugCollision,
    DanglingReference,
    NotFound,
    MigrationFailed,
    Cancelled,
    IoFailure,
}

impl ErrorKind {
    /// HTTP-style status class for API layers
    pub fn status_class(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::MalformedIdentifier => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::SlugCollision => 409,
            ErrorKind::DanglingReference => 422,
            ErrorKind::MigrationFailed | ErrorKind::Cancelled | ErrorKind::IoFailure => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::MalformedIdentifier => "malformed_identifier",
            ErrorKind::SlugCollision => "slug_collision",
            ErrorKind::DanglingReference => "dangling_reference",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MigrationFailed => "migration_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::IoFailure => "io_failure",
        };
        write!(f, "{}", s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::MalformedIdentifier { .. } => ErrorKind::MalformedIdentifier,
            Error::SlugCollision { .. } => ErrorKind::SlugCollision,
            Error::DanglingReference { .. } => ErrorKind::DanglingReference,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::MigrationFailed { .. } => ErrorKind::MigrationFailed,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io { .. } | Error::Serialization { .. } => ErrorKind::IoFailure,
        }
    }

    pub fn malformed(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedIdentifier {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound { id: id.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Serialization {
            path: path.into(),
            source,
        }
    }

    /// Field errors carried by a validation failure (empty for other kinds)
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = Error::Validation(vec![
            FieldError::new("slug", "too short"),
            FieldError::new("names", "missing PRIMARY name"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("slug: too short"));
        assert!(msg.contains("names: missing PRIMARY name"));
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        assert_eq!(Error::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::SlugCollision { id: "x".into() }.kind(),
            ErrorKind::SlugCollision
        );
        assert_eq!(Error::malformed("x", "bad").kind(), ErrorKind::MalformedIdentifier);
        let io = Error::io("/tmp/x", std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(ErrorKind::NotFound.status_class(), 404);
        assert_eq!(ErrorKind::SlugCollision.status_class(), 409);
        assert_eq!(ErrorKind::Validation.status_class(), 400);
        assert_eq!(ErrorKind::DanglingReference.status_class(), 422);
        assert_eq!(ErrorKind::IoFailure.status_class(), 500);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::SlugCollision.to_string(), "slug_collision");
    }
}
