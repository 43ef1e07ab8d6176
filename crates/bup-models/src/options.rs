//! Publisher options.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::journal::DEFAULT_JOURNAL_NAME;
use crate::route::CdnConfig;

/// Options recognized by the publisher.
///
/// Lowercase aliases accept keys coming through the `config` crate, which
/// folds key case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOptions {
    /// One route or a list of routes
    #[serde(default)]
    pub cdn: Option<CdnConfig>,
    /// Clean up the previous run's uploads before publishing
    #[serde(default, alias = "deleteprevious")]
    pub delete_previous: bool,
    /// Remove local artifacts after they were uploaded
    #[serde(default, alias = "deleteoutput")]
    pub delete_output: bool,
    /// Journal file name override
    #[serde(default, alias = "logname")]
    pub log_name: Option<String>,
    /// Journal directory override
    #[serde(default, alias = "logpath")]
    pub log_path: Option<PathBuf>,
    /// Message table: `cn`, `en` or a path to a custom table
    #[serde(default)]
    pub lang: Option<String>,
}

impl PublishOptions {
    pub fn new(cdn: impl Into<CdnConfig>) -> Self {
        Self {
            cdn: Some(cdn.into()),
            ..Default::default()
        }
    }

    /// Location of the journal for a run writing into `output_root`.
    pub fn journal_path(&self, output_root: &Path) -> PathBuf {
        let dir = self.log_path.as_deref().unwrap_or(output_root);
        let name = self
            .log_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_JOURNAL_NAME);
        dir.join(name)
    }
}
