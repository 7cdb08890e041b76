//! Domain error taxonomy.
//!
//! File- and record-scoped errors ([`LiaError::Parse`],
//! [`LiaError::EmbeddingCompute`]) are recovered by their callers; process-scoped
//! errors ([`LiaError::ModelLoad`], [`LiaError::IpcConnection`]) surface to the
//! user with a non-zero exit.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`LiaError`].
pub type Result<T> = std::result::Result<T, LiaError>;

#[derive(Error, Debug)]
pub enum LiaError {
    #[error("malformed topic '{topic}' (line {line}): {message}")]
    Parse {
        topic: String,
        line: usize,
        message: String,
    },

    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("failed to compute embedding: {0}")]
    EmbeddingCompute(String),

    #[error("cannot reach the matching service at {}: {source}", path.display())]
    IpcConnection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist review schedule: {0}")]
    ScheduleWrite(#[source] rusqlite::Error),

    #[error("Topic '{0}' does not exist. Run `lia list --topics` to see all topics.")]
    UnknownTopic(String),

    #[error("review group {0} not found")]
    GroupNotFound(i64),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("matching service error: {0}")]
    Service(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LiaError {
    /// `true` for errors scoped to a single file or record, which callers skip
    /// instead of aborting the whole operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::EmbeddingCompute(_) | Self::ScheduleWrite(_)
        )
    }
}
