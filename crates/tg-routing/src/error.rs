// error.rs — Error types for route-group operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::group::RouteKey;

/// Errors that can occur while reading or mutating the routing table.
#[derive(Debug, Error)]
pub enum RouteError {
    /// `register` on a key that already has a group (stack onto it instead).
    #[error("route group already exists for {key}")]
    AlreadyExists { key: RouteKey },

    /// The group, or the binding within it, does not exist.
    #[error("{what} not found for {key}")]
    NotFound { key: RouteKey, what: String },

    /// The group is not in a state that allows the operation.
    #[error("invalid state for {key}: {reason}")]
    InvalidState { key: RouteKey, reason: String },

    /// The routing store or instance directory could not be reached.
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RouteError {
    pub fn transport(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        RouteError::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Attribute a transport failure to the outer operation that was attempted.
    ///
    /// The inner operation name is kept at the front of the message. A table
    /// that cannot be decoded or encoded is reported the same way as one
    /// that cannot be read.
    pub fn during(self, operation: &str) -> Self {
        match self {
            RouteError::Transport {
                operation: inner,
                message,
            } if inner != operation => RouteError::Transport {
                operation: operation.to_string(),
                message: format!("{}: {}", inner, message),
            },
            RouteError::Io { path, source } => RouteError::Transport {
                operation: operation.to_string(),
                message: format!("{}: {}", path.display(), source),
            },
            RouteError::Serialization(e) => RouteError::Transport {
                operation: operation.to_string(),
                message: format!("routing table: {}", e),
            },
            other => other,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouteError::Transport { .. } | RouteError::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn during_renames_transport_operation() {
        let err = RouteError::transport("save_routes", "disk full").during("stack_route");
        assert_eq!(err.to_string(), "stack_route failed: save_routes: disk full");
        assert!(err.is_retryable());
    }

    #[test]
    fn during_wraps_serialization_failure() {
        let decode = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        let err = RouteError::from(decode).during("unstack_route");
        match err {
            RouteError::Transport { operation, message } => {
                assert_eq!(operation, "unstack_route");
                assert!(message.starts_with("routing table: "), "{}", message);
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn during_leaves_state_errors_alone() {
        let key = RouteKey::new("docs", "search");
        let err = RouteError::AlreadyExists { key }.during("register_route");
        assert_eq!(err.to_string(), "route group already exists for docs/search");
        assert!(!err.is_retryable());
    }
}
