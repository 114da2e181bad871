// error.rs — Error types for the policy compiler.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One structural or semantic defect in a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Field path into the document, e.g. `toolOverrides.gmail.send_email.verb`.
    pub path: String,
    pub message: String,
}

impl Finding {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The full findings list of a document that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("policy document has {} validation finding(s)", findings.len())]
pub struct ValidationError {
    pub findings: Vec<Finding>,
}

/// Failure to resolve a community profile by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// The identifier does not follow `<org>/security-<service>`.
    #[error("invalid profile id '{id}': expected '<org>/security-<service>'")]
    InvalidProfileId { id: String },

    /// The identifier is well-formed but the catalog has no entry for the service.
    #[error("profile '{id}' not found (no catalog entry for service '{service}')")]
    ProfileNotFound { id: String, service: String },
}

/// Failure reaching the profile catalog or the policy store.
///
/// Always retryable by the caller; `operation` names what was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct TransportError {
    pub operation: String,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Errors that can occur while loading, compiling or publishing a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse policy document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to serialize merged policy: {0}")]
    Serialize(#[from] serde_json::Error),
}
