//! Error types for the `devtools-rag` crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a persistent-store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// The storage quota is exhausted. Callers should offer to clear old context.
    QuotaExceeded,
    /// The store could not be opened or the connection was lost.
    Connection,
    /// A read or write transaction failed.
    Transaction,
    /// The on-disk schema is newer than this build understands.
    VersionConflict,
    /// Stored data could not be decoded.
    Corrupt,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QuotaExceeded => "quota exceeded",
            Self::Connection => "connection",
            Self::Transaction => "transaction",
            Self::VersionConflict => "version conflict",
            Self::Corrupt => "corrupt data",
        };
        f.write_str(name)
    }
}

/// A structured persistent-store failure.
///
/// Every failing store operation produces one of these, records it as the
/// store's last error and returns it to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{operation} failed ({kind}): {message}")]
pub struct StoreError {
    /// What went wrong.
    pub kind: StoreErrorKind,
    /// The store operation that failed (`open`, `put_entries`, `read_count`, ...).
    pub operation: String,
    /// A description of the failure.
    pub message: String,
    /// When the failure happened.
    pub timestamp: DateTime<Utc>,
}

impl StoreError {
    /// Create a new store error stamped with the current time.
    pub fn new(
        kind: StoreErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { kind, operation: operation.into(), message: message.into(), timestamp: Utc::now() }
    }

    /// Whether this failure was caused by a full store.
    pub fn is_quota_exceeded(&self) -> bool {
        self.kind == StoreErrorKind::QuotaExceeded
    }
}

/// Errors that can occur in context-retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during remote embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the persistent store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An export snapshot could not be imported.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// The engine was used before `open()` or after `close()`.
    #[error("context engine is not open")]
    NotOpen,

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// The structured store error behind this failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }

    /// A short message suitable for showing in the chat UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Store(e) if e.is_quota_exceeded() => {
                "Storage full. Clear old context to continue."
            }
            _ => "Context system unavailable.",
        }
    }
}

/// A convenience result type for context-retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
