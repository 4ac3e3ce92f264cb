//! Error types for the sync daemon.
//!
//! Per-id content fetch failures are *not* errors at this level; they are
//! recorded as [`vellum_core::ContentResult::Failed`] lines in the content
//! log. The variants here are the failures that stop a cycle or a run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronizing the ledger.
#[derive(Error, Debug)]
pub enum Error {
    /// The paged query transport failed (network, HTTP, or GraphQL-level).
    /// The current cycle aborts with the cursor untouched; the whole run is
    /// safe to retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// The trailing line of a log file could not be parsed. Surfaced to the
    /// operator; never auto-repaired.
    #[error("corrupt log {path}: unparsable trailing line: {source}")]
    CorruptLog {
        /// The log file with the bad trailing line.
        path: PathBuf,
        /// The parse failure.
        source: serde_json::Error,
    },

    /// Feed generation failed. User-facing output, so this is a hard error.
    #[error("feed generation failed: {0}")]
    Feed(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Core type error (record/document parsing).
    #[error(transparent)]
    Core(#[from] vellum_core::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        let err = Error::Transport("connection refused".to_string());
        assert!(err.to_string().contains("transport error"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_corrupt_log_display_names_path() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::CorruptLog {
            path: PathBuf::from("/data/records.jsonl"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/records.jsonl"));
        assert!(msg.contains("trailing line"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
