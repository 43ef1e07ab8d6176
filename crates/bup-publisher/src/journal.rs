//! Publish journal persistence.
//!
//! Lifecycle: absent, written at the end of a run with at least one upload,
//! consumed at the start of the next run that requests cleanup, and removed
//! once that cleanup reports a definite deleted count.

use std::path::{Path, PathBuf};

use bup_models::PublishJournal;
use tracing::{debug, info};

use crate::error::{JournalError, JournalResult};

/// Journal file at a fixed location.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a run's record, replacing any previous journal.
    pub async fn write(&self, record: &PublishJournal) -> JournalResult<()> {
        let body = serde_json::to_vec(record)?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|source| JournalError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;

        info!(
            path = %self.path.display(),
            files = record.files.len(),
            "Saved publish journal"
        );
        Ok(())
    }

    /// Read and parse the journal for cleanup.
    ///
    /// On any error the file is left untouched.
    pub async fn consume(&self) -> JournalResult<ConsumedJournal> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JournalError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(JournalError::Unreadable {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let record: PublishJournal =
            serde_json::from_slice(&raw).map_err(|e| JournalError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            path = %self.path.display(),
            files = record.files.len(),
            "Loaded publish journal"
        );
        Ok(ConsumedJournal {
            path: self.path.clone(),
            record,
        })
    }
}

/// A journal read for cleanup, not yet removed.
#[derive(Debug)]
pub struct ConsumedJournal {
    path: PathBuf,
    record: PublishJournal,
}

impl ConsumedJournal {
    pub fn record(&self) -> &PublishJournal {
        &self.record
    }

    /// Remove the journal file after a successful cleanup.
    pub async fn mark_deleted(self) -> JournalResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed publish journal");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(JournalError::WriteFailed {
                path: self.path,
                source,
            }),
        }
    }
}
