//! Centralized error types for canvass.

use thiserror::Error;

use crate::ingest::{Checkpoint, Stage};

/// Main error type for canvass operations.
#[derive(Error, Debug)]
pub enum CanvassError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Batch timed out after {secs}s")]
    BatchTimeout { secs: u64 },

    #[error(
        "Batch write failed in stage '{stage}' at offset {offset} (cursor {}) after {attempts} attempt(s): {message}",
        cursor.as_deref().unwrap_or("<start>")
    )]
    BatchWrite {
        stage: Stage,
        offset: usize,
        cursor: Option<String>,
        attempts: u32,
        message: String,
    },

    #[error("Ingestion cancelled at {checkpoint}")]
    Cancelled { checkpoint: Checkpoint },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported by this store: {0}")]
    Unsupported(String),
}

/// Result type for canvass operations.
pub type CanvassResult<T> = Result<T, CanvassError>;

impl CanvassError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid filter error.
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether an ingestion batch hitting this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Store(_) | Self::BatchTimeout { .. }
        )
    }
}
