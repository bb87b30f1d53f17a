use std::path::PathBuf;
use thiserror::Error;

use crate::types::BatchOutcome;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable {
        backend: &'static str,
        message: String,
    },

    #[error("embedding failed ({}): {message}", if *transient { "transient" } else { "permanent" })]
    EmbeddingFailure { transient: bool, message: String },

    #[error(
        "partial batch failure: {} succeeded, {} failed",
        outcome.succeeded.len(),
        outcome.failed.len()
    )]
    PartialBatch { outcome: BatchOutcome },

    #[error("query error: {0}")]
    Query(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for error tallies in indexing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum ErrorKind {
    InvalidPath,
    BackendUnavailable,
    EmbeddingFailure,
    PartialBatch,
    Query,
    Store,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
            Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Error::EmbeddingFailure { .. } => ErrorKind::EmbeddingFailure,
            Error::PartialBatch { .. } => ErrorKind::PartialBatch,
            Error::Query(_) => ErrorKind::Query,
            Error::Store(_) => ErrorKind::Store,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// True for failures worth retrying with backoff at indexing time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable { .. }
                | Error::EmbeddingFailure {
                    transient: true,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
