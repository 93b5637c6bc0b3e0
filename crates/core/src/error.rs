//! Error types for rankstore
//!
//! This module defines the error hierarchy shared by the store and ingest
//! layers. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! The taxonomy follows how errors propagate at runtime:
//! - `Codec` / `Descriptor` / `Scope` are hard failures of the offending
//!   operation and abort the enclosing run with a diagnostic.
//! - `BackendTransient` is retried with backoff by the store layer and only
//!   surfaces as `RetriesExhausted`.
//! - Ordering inversions during replay are a last-resort guard; the importer
//!   normally re-sorts before they can occur.

use crate::codec::CodecError;
use crate::descriptor::DescriptorError;
use crate::scope::ScopeError;
use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Result type alias for rankstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the rankstore system
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, disk backend files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed bytes on decode; fatal for the record being read
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Invalid state descriptor or feature mapping
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Scope does not match the descriptor's declared dimensions
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// Non-transient backend failure (corrupt table, closed database, ...)
    #[error("backend error: {0}")]
    Backend(String),

    /// Transient backend failure; retried with backoff by the store layer
    #[error("transient backend error: {0}")]
    BackendTransient(String),

    /// Transient failures persisted past the retry budget
    #[error("backend retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made (initial call plus retries)
        attempts: u32,
        /// Message of the last transient failure
        last: String,
    },

    /// Residual timestamp inversion during replay after validation claimed
    /// the stream ordered
    #[error("event stream inverted at position {position}: {prev} followed by {next}")]
    StreamInverted {
        /// Zero-based position of the offending event
        position: usize,
        /// Timestamp of the preceding event
        prev: DateTime<Utc>,
        /// Timestamp of the offending event
        next: DateTime<Utc>,
    },

    /// Invalid configuration supplied to store construction or import
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is retryable by the store-level retry policy
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::BackendTransient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_backend() {
        let err = Error::Backend("table missing".to_string());
        let msg = err.to_string();
        assert!(msg.contains("backend error"));
        assert!(msg.contains("table missing"));
    }

    #[test]
    fn test_error_display_retries_exhausted() {
        let err = Error::RetriesExhausted {
            attempts: 4,
            last: "connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_error_display_stream_inverted() {
        let prev = Utc::now();
        let next = prev - chrono::Duration::seconds(5);
        let err = Error::StreamInverted {
            position: 17,
            prev,
            next,
        };
        assert!(err.to_string().contains("position 17"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::BackendTransient("timeout".into()).is_transient());
        assert!(!Error::Backend("corrupt".into()).is_transient());
        assert!(!Error::Config("bad path".into()).is_transient());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_codec() {
        let err: Error = CodecError::Decode("bad frame".to_string()).into();
        assert!(matches!(err, Error::Codec(_)));
        assert!(err.to_string().contains("bad frame"));
    }
}
