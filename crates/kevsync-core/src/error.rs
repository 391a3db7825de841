//! Error types for KEV sync

use crate::report::SyncReport;
use thiserror::Error;

/// Result type alias using the KEV sync Error
pub type Result<T> = std::result::Result<T, Error>;

/// KEV sync error types
#[derive(Error, Debug)]
pub enum Error {
    // === Retrieval Errors ===
    #[error("Invalid URL scheme '{scheme}' in {url} (expected http or https)")]
    InvalidScheme { url: String, scheme: String },

    #[error("Failed to retrieve {url}: HTTP {status}")]
    RetrievalFailed { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        timed_out: bool,
    },

    #[error("Failed to decode {url}: {message} (near: {snippet:?})")]
    DecodeError {
        url: String,
        message: String,
        snippet: String,
    },

    // === Validation Errors ===
    #[error("Schema document is invalid: {0}")]
    SchemaInvalid(String),

    #[error("Feed violates schema: {}", .violations.join("; "))]
    SchemaViolation { violations: Vec<String> },

    #[error("Feed entry #{position} has no cveID{}", .vulnerability.as_deref().map(|v| format!(" ({})", v)).unwrap_or_default())]
    MissingIdentifier {
        position: usize,
        vulnerability: Option<String>,
    },

    // === Persistence Errors ===
    #[error("Failed to {operation} record {id}: {message}")]
    PersistenceFailure {
        id: String,
        operation: WriteOp,
        message: String,
    },

    #[error("Sync incomplete: {} record(s) failed to persist", .0.failures.len())]
    PartialSync(Box<SyncReport>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Sync cancelled after {processed} feed entries")]
    Cancelled { processed: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The kind of write a persistence failure happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteOp::Insert => "insert",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Check if this error is worth retrying (transient transport trouble)
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::RetrievalFailed { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Check if this error means the feed cannot be trusted and the run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidScheme { .. }
                | Error::RetrievalFailed { .. }
                | Error::Transport { .. }
                | Error::DecodeError { .. }
                | Error::SchemaInvalid(_)
                | Error::SchemaViolation { .. }
                | Error::Configuration(_)
                | Error::InvalidConfig { .. }
        )
    }

    /// Get an error code for logging/exit mapping
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidScheme { .. } => "INVALID_SCHEME",
            Error::RetrievalFailed { .. } => "RETRIEVAL_FAILED",
            Error::Transport { .. } => "TRANSPORT_ERROR",
            Error::DecodeError { .. } => "DECODE_ERROR",
            Error::SchemaInvalid(_) => "SCHEMA_INVALID",
            Error::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            Error::MissingIdentifier { .. } => "MISSING_IDENTIFIER",
            Error::PersistenceFailure { .. } => "PERSISTENCE_FAILURE",
            Error::PartialSync(_) => "PARTIAL_SYNC",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Cancelled { .. } => "CANCELLED",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let err = |status| Error::RetrievalFailed {
            url: "https://example.com/feed.json".into(),
            status,
        };
        assert!(err(503).is_retryable());
        assert!(err(429).is_retryable());
        assert!(!err(404).is_retryable());
        assert!(!err(403).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        let scheme = Error::InvalidScheme {
            url: "ftp://example.com/feed.json".into(),
            scheme: "ftp".into(),
        };
        assert!(scheme.is_fatal());
        assert!(!scheme.is_retryable());
        assert_eq!(scheme.code(), "INVALID_SCHEME");

        let missing = Error::MissingIdentifier {
            position: 3,
            vulnerability: None,
        };
        assert!(!missing.is_fatal());
    }

    #[test]
    fn test_missing_identifier_message() {
        let err = Error::MissingIdentifier {
            position: 7,
            vulnerability: Some("Deserialization Vulnerability".into()),
        };
        assert_eq!(
            err.to_string(),
            "Feed entry #7 has no cveID (Deserialization Vulnerability)"
        );
    }

    #[test]
    fn test_schema_violation_message() {
        let err = Error::SchemaViolation {
            violations: vec![
                "/count: \"five\" is not of type \"integer\"".into(),
                "/: \"catalogVersion\" is a required property".into(),
            ],
        };
        assert!(err.to_string().contains("is not of type"));
        assert!(err.to_string().contains("; "));
    }
}
