//! Publisher error types.

use std::path::PathBuf;

use bup_models::ModelError;
use bup_storage::StorageError;
use thiserror::Error;

pub type PublishResult<T> = Result<T, PublishError>;
pub type JournalResult<T> = Result<T, JournalError>;
pub type CleanupResult<T> = Result<T, CleanupError>;

/// Errors raised while validating routes or publishing assets.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Route configuration rejected before any backend I/O
    #[error("{0}")]
    Configuration(String),

    /// Duplicate match pattern declined at the confirmation prompt
    #[error("{0}")]
    DuplicatePattern(String),

    /// The asset's bytes could not be obtained
    #[error("{message}")]
    FileRead { file: String, message: String },

    /// A backend rejected an upload
    #[error("{message}")]
    Upload {
        file: String,
        message: String,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Options error: {0}")]
    Options(#[from] ::config::ConfigError),
}

impl PublishError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn file_read(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileRead {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Whether the whole run must be rejected before any I/O.
    pub fn is_configuration(&self) -> bool {
        match self {
            PublishError::Configuration(_)
            | PublishError::DuplicatePattern(_)
            | PublishError::Model(_)
            | PublishError::Options(_) => true,
            PublishError::Storage(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Errors reading or removing the publish journal.
///
/// All of them downgrade cleanup to "skipped" for the run.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Previous log file doesn't exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read previous log {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid previous log file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to save log {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the delete orchestrator.
///
/// Any of these leaves the journal in place for the next run.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Empty previous uploaded file")]
    EmptyJournal,

    #[error("Invalid route in previous log: {0}")]
    InvalidRoute(String),

    #[error("Delete failed on {backend}: {source}")]
    Backend {
        backend: String,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

impl CleanupError {
    pub fn invalid_route(msg: impl Into<String>) -> Self {
        Self::InvalidRoute(msg.into())
    }
}
