// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the change replicator.
//!
//! Errors are categorized by the pipeline stage that raised them and carry
//! enough context (collection, index, message) to be reported back to the
//! caller inside a [`BatchOutcome`](crate::outcome::BatchOutcome).
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `MalformedEnvelope` | No | Notification is missing required fields |
//! | `InvalidCollection` | No | Collection name cannot be resolved |
//! | `BackendUnavailable` | Yes | Transient backend connectivity failure |
//! | `PayloadRejected` | No | Backend refused the write (e.g. size limit) |
//! | `Cancelled` | No | Batch cancelled before the record started |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Record state machine violation |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`ReplicationError::is_retryable()`] to decide whether an operation
//! should be retried with backoff. Only `BackendUnavailable` qualifies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for replicator operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur while replicating a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// A notification envelope lacks a required field or has the wrong shape.
    ///
    /// Not retryable - the envelope is malformed at the source.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The collection name is empty or unknown to the backend.
    ///
    /// Not retryable - retrying will not make the collection appear.
    #[error("Invalid collection '{collection}': {message}")]
    InvalidCollection { collection: String, message: String },

    /// Transient backend failure (timeouts, throttling, connection drops).
    ///
    /// Retryable with exponential backoff.
    #[error("Backend unavailable ({operation}): {message}")]
    BackendUnavailable { operation: String, message: String },

    /// The backend refused the write.
    ///
    /// Not retryable - the payload itself is the problem.
    #[error("Payload rejected for '{collection}': {message}")]
    PayloadRejected { collection: String, message: String },

    /// Cancellation was observed before the work started.
    #[error("Batch cancelled")]
    Cancelled,

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record state machine violation.
    ///
    /// Indicates a bug in the coordinator.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Unexpected internal error (e.g. a pipeline task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ReplicationError`], reported in outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedEnvelope,
    InvalidCollection,
    BackendUnavailable,
    PayloadRejected,
    Cancelled,
    Config,
    InvalidState,
    Internal,
}

impl ErrorKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope => "malformed_envelope",
            Self::InvalidCollection => "invalid_collection",
            Self::BackendUnavailable => "backend_unavailable",
            Self::PayloadRejected => "payload_rejected",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::InvalidState => "invalid_state",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReplicationError {
    /// Create a `BackendUnavailable` error for an operation.
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an `InvalidCollection` error.
    pub fn invalid_collection(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCollection {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a `PayloadRejected` error.
    pub fn rejected(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadRejected {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BackendUnavailable { .. } => true,
            Self::MalformedEnvelope(_) => false,
            Self::InvalidCollection { .. } => false,
            Self::PayloadRejected { .. } => false,
            Self::Cancelled => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Internal(_) => false,
        }
    }

    /// Classify this error for outcome reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedEnvelope(_) => ErrorKind::MalformedEnvelope,
            Self::InvalidCollection { .. } => ErrorKind::InvalidCollection,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::PayloadRejected { .. } => ErrorKind::PayloadRejected,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
