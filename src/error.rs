//! Error types for the cache engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache engine
#[derive(Error, Debug)]
pub enum Error {
    /// Value could not be serialized before a write
    #[error("serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// Value could not be deserialized into the requested type
    #[error("deserialization failed for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// A remote node could not be reached
    #[error("node {node_id} unavailable: {reason}")]
    NodeUnavailable { node_id: String, reason: String },

    /// A remote call exceeded its timeout budget
    #[error("call to node {node_id} timed out after {timeout_ms}ms")]
    Timeout { node_id: String, timeout_ms: u64 },

    /// Every attempted write location (local and remote) failed
    #[error("write failed on all replicas for key {key}")]
    AllReplicasFailed { key: String },

    /// Quorum write could not gather enough acknowledgements
    #[error("quorum not reached for key {key}: have {acked}, need {required}")]
    QuorumNotReached {
        key: String,
        acked: usize,
        required: usize,
    },

    /// Invalid regex supplied to pattern invalidation
    #[error("invalid invalidation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Unknown node referenced by id
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Cache warming loader failed for a pattern
    #[error("warm loader failed for pattern {pattern}: {reason}")]
    WarmLoadFailed { pattern: String, reason: String },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a serialization error for a key
    pub fn serialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Serialization {
            key: key.into(),
            reason: err.to_string(),
        }
    }

    /// Build a deserialization error for a key
    pub fn deserialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Deserialization {
            key: key.into(),
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Timeout {
            node_id: "node-1".to_string(),
            timeout_ms: 150,
        };
        assert_eq!(err.to_string(), "call to node node-1 timed out after 150ms");
    }

    #[test]
    fn test_serialization_helper() {
        let err = Error::serialization("user:1", "not valid json");
        assert!(err.to_string().contains("user:1"));
        assert!(err.to_string().contains("not valid json"));
    }

    #[test]
    fn test_invalid_pattern_from_regex() {
        let regex_err = regex::Regex::new("[unclosed").unwrap_err();
        let err: Error = regex_err.into();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }
}
