//! Typed errors for the image migration library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! transient page timeouts apart from run-fatal conditions.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while migrating inspection images.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A page fetch did not complete within the configured timeout
    #[error("page fetch timed out after {0:?}")]
    PageTimeout(Duration),

    /// Document store operation failed
    #[error("document store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Blob store operation failed
    #[error("blob store error: {0}")]
    Blob(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Inline payload could not be decoded at all
    #[error("undecodable inline image in {record_id}.{field}[{index}]: {source}")]
    Decode {
        record_id: String,
        field: String,
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    /// A run is already in progress on this runner
    #[error("migration already running")]
    AlreadyRunning,

    /// The run accumulated more errors than allowed and was aborted
    #[error("error ceiling exceeded after {errors} errors: {last_error}")]
    ErrorCeilingExceeded { errors: usize, last_error: String },

    /// No migration plan registered under this name
    #[error("unknown migration plan: {0}")]
    UnknownPlan(String),

    /// Document shape is not what the plan expects
    #[error("invalid record {record_id}: {reason}")]
    InvalidRecord { record_id: String, reason: String },

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// Wrap any error as a document store failure.
    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }

    /// Wrap any error as a blob store failure.
    pub fn blob(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Blob(Box::new(err))
    }

    /// Whether this is the timeout flavour the runner reacts to by shrinking pages.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PageTimeout(_))
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
